//! Recording state machine.
//!
//! ```text
//! Idle ──(capture enabled)──> Armed ──start()──> Recording ──shutdown()──> Closed
//!                               │                   │
//!                               └─ spawn failure ─> Idle      write failure ─> Closed
//! ```
//!
//! The first frame captured after `start` is dropped: it predates the first
//! completed render of the scene.

use std::path::{Path, PathBuf};

use bevy::prelude::*;

use super::capture::{frame_len, CaptureStatus, Frame, FrameSource, RowOrder};
use super::clock::{frame_step, SessionClock};
use super::encoder::{EncoderConfig, FrameSink, SinkLauncher};
use super::RecordingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    /// No encoder; capture disabled or failed to start.
    Idle,
    /// Configured, waiting for `start`.
    Armed,
    Recording,
    /// Encoder input closed; nothing more will be written.
    Closed,
}

/// What the pipeline wants after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    Stop,
}

/// Owns the encoder sink and feeds it one frame per tick.
#[derive(Resource)]
pub struct RecordingPipeline {
    state: RecordingState,
    config: Option<EncoderConfig>,
    sink: Option<Box<dyn FrameSink>>,
    poster: Option<PathBuf>,
    first_frame_dropped: bool,
    frames_written: u64,
    frames_missed: u64,
    last_error: Option<RecordingError>,
}

impl Default for RecordingPipeline {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RecordingPipeline {
    /// A pipeline that never records.
    pub fn disabled() -> Self {
        Self {
            state: RecordingState::Idle,
            config: None,
            sink: None,
            poster: None,
            first_frame_dropped: false,
            frames_written: 0,
            frames_missed: 0,
            last_error: None,
        }
    }

    /// A pipeline waiting to start with `config`.
    pub fn armed(config: EncoderConfig) -> Self {
        Self {
            state: RecordingState::Armed,
            config: Some(config),
            ..Self::disabled()
        }
    }

    /// Also save the first recorded frame as a PNG at `path`.
    pub fn with_poster(mut self, path: impl Into<PathBuf>) -> Self {
        self.poster = Some(path.into());
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.config.as_ref()
    }

    /// Update the frame size and row order before `start`.
    pub fn configure_surface(&mut self, width: u32, height: u32, row_order: RowOrder) {
        if let Some(config) = self.config.as_mut() {
            config.width = width;
            config.height = height;
            config.row_order = row_order;
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Ticks where no frame was available or the frame was rejected.
    pub fn frames_missed(&self) -> u64 {
        self.frames_missed
    }

    /// The failure that ended or prevented recording, if any.
    pub fn last_error(&self) -> Option<&RecordingError> {
        self.last_error.as_ref()
    }

    /// Launch the encoder and lock the clock to `1 / fps`.
    ///
    /// Only acts when `Armed`. A spawn failure is logged and leaves the
    /// pipeline `Idle`; rendering goes on without capture.
    pub fn start(
        &mut self,
        launcher: &mut dyn SinkLauncher,
        clock: &mut dyn SessionClock,
    ) -> RecordingState {
        if self.state != RecordingState::Armed {
            return self.state;
        }
        let Some(config) = self.config.as_ref() else {
            self.state = RecordingState::Idle;
            return self.state;
        };

        match launcher.launch(config) {
            Ok(sink) => {
                clock.set_fixed_step(frame_step(config.fps));
                self.sink = Some(sink);
                self.state = RecordingState::Recording;
            }
            Err(e) => {
                warn!("Recording disabled: {}", e);
                self.last_error = Some(e);
                self.state = RecordingState::Idle;
            }
        }
        self.state
    }

    /// Process one render tick.
    pub fn step(&mut self, source: &mut dyn FrameSource) -> StepStatus {
        match self.state {
            RecordingState::Idle | RecordingState::Closed => return StepStatus::Stop,
            RecordingState::Armed => return StepStatus::Continue,
            RecordingState::Recording => {}
        }

        let frame = match source.capture() {
            CaptureStatus::Ready(frame) => frame,
            CaptureStatus::Unavailable => {
                warn!("No frame available this tick, skipping");
                self.frames_missed += 1;
                return StepStatus::Continue;
            }
        };

        if !self.first_frame_dropped {
            self.first_frame_dropped = true;
            debug!("Dropping first captured frame");
            return StepStatus::Continue;
        }

        if let Some(config) = self.config.as_ref() {
            let expected = frame_len(config.width, config.height);
            if frame.bytes.len() != expected {
                warn!(
                    "Skipping frame: {}",
                    RecordingError::Frame {
                        expected,
                        actual: frame.bytes.len(),
                    }
                );
                self.frames_missed += 1;
                return StepStatus::Continue;
            }
        }

        if self.frames_written == 0 {
            if let Some(path) = self.poster.as_deref() {
                let row_order = self.config.as_ref().map(|c| c.row_order).unwrap_or_default();
                save_poster(&frame, row_order, path);
            }
        }

        let Some(sink) = self.sink.as_mut() else {
            self.state = RecordingState::Closed;
            return StepStatus::Stop;
        };
        match sink.write_frame(&frame.bytes) {
            Ok(()) => {
                self.frames_written += 1;
                StepStatus::Continue
            }
            Err(e) => {
                error!("Recording stopped after {} frames: {}", self.frames_written, e);
                self.last_error = Some(e);
                self.close_sink();
                self.state = RecordingState::Closed;
                StepStatus::Stop
            }
        }
    }

    /// Close the encoder input, wait for it to drain and give the clock
    /// back to real time. Idempotent.
    pub fn shutdown(&mut self, clock: &mut dyn SessionClock) -> Result<(), RecordingError> {
        match self.state {
            RecordingState::Idle => return Ok(()),
            RecordingState::Armed => {
                self.state = RecordingState::Idle;
                return Ok(());
            }
            RecordingState::Recording | RecordingState::Closed => {}
        }

        clock.set_realtime();
        self.state = RecordingState::Closed;
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        let result = sink.finish();
        match &result {
            Ok(()) => {
                let output = self
                    .config
                    .as_ref()
                    .map(|c| c.output_path().display().to_string())
                    .unwrap_or_default();
                info!("Recording finished: {} frames to {}", self.frames_written, output);
            }
            Err(e) => warn!("Recording output may be corrupt: {}", e),
        }
        result
    }

    fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.finish() {
                debug!("Encoder finish after write failure: {}", e);
            }
        }
    }
}

fn save_poster(frame: &Frame, row_order: RowOrder, path: &Path) {
    let Some(mut img) = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba())
    else {
        warn!("Poster frame has the wrong size, not saved");
        return;
    };
    if row_order == RowOrder::BottomUp {
        image::imageops::flip_vertical_in_place(&mut img);
    }
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match img.save(path) {
        Ok(()) => info!("Poster frame saved to {}", path.display()),
        Err(e) => warn!("Failed to save poster frame: {}", e),
    }
}
