//! Frame-locked video capture.
//!
//! [`RecordingPipeline`] pulls rendered frames from a [`FrameSource`] each
//! tick and streams them to an external encoder through a [`FrameSink`].
//! [`RecordingPlugin`] drives it from Bevy's schedules.

mod capture;
mod clock;
mod encoder;
mod pipeline;
mod plugin;

pub use capture::{
    frame_len, CaptureStatus, Frame, FrameSource, RowOrder, ScreenshotFrameSource,
    BYTES_PER_PIXEL,
};
pub use clock::{frame_step, SessionClock};
pub use encoder::{
    default_program, EncoderConfig, FfmpegLauncher, FfmpegSink, FrameSink, SinkLauncher,
    OUTPUT_EXTENSION,
};
pub use pipeline::{RecordingPipeline, RecordingState, StepStatus};
pub use plugin::{RecordingLauncher, RecordingPlugin, RecordingSettings};

/// Failures on the capture path. None of them stop rendering.
#[derive(Debug)]
pub enum RecordingError {
    /// Encoder process could not be started.
    Spawn(std::io::Error),
    /// Writing a frame into the encoder failed, usually a broken pipe.
    Write(std::io::Error),
    /// Encoder did not drain cleanly on shutdown; output may be corrupt.
    Flush(std::io::Error),
    /// Frame size does not match the size the encoder was started with.
    Frame { expected: usize, actual: usize },
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::Spawn(e) => write!(f, "failed to start encoder: {}", e),
            RecordingError::Write(e) => write!(f, "failed to write frame to encoder: {}", e),
            RecordingError::Flush(e) => write!(f, "encoder did not finish cleanly: {}", e),
            RecordingError::Frame { expected, actual } => write!(
                f,
                "frame is {} bytes, encoder expects {}",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::Spawn(e) | RecordingError::Write(e) | RecordingError::Flush(e) => {
                Some(e)
            }
            RecordingError::Frame { .. } => None,
        }
    }
}
