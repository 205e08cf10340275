//! External video encoder process.
//!
//! Frames go to the encoder's stdin as raw BGRA, one `width × height × 4`
//! block per frame. Shutdown closes stdin and then waits for the process
//! to exit so the output container is fully written.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use bevy::prelude::*;

use super::capture::RowOrder;
use super::RecordingError;

/// Output container extension.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Default encoder executable for this platform.
pub fn default_program() -> String {
    if cfg!(windows) {
        "ffmpeg.exe".to_string()
    } else {
        "ffmpeg".to_string()
    }
}

/// Everything needed to launch one encoder process.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    pub program: String,
    /// Output path without extension.
    pub output: PathBuf,
    pub fps: u32,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub row_order: RowOrder,
}

impl EncoderConfig {
    pub fn new(output: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            program: default_program(),
            output: output.into(),
            fps: 60,
            codec: "libx264".to_string(),
            width,
            height,
            row_order: RowOrder::TopDown,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    /// Output file: base name plus the fixed extension.
    pub fn output_path(&self) -> PathBuf {
        let mut path = self.output.clone().into_os_string();
        path.push(".");
        path.push(OUTPUT_EXTENSION);
        PathBuf::from(path)
    }

    /// Command-line arguments for the encoder.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-r".into(),
            self.fps.to_string(),
            "-an".into(),
            "-analyzeduration".into(),
            "0".into(),
            "-s".into(),
            format!("{}x{}", self.width, self.height),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "bgra".into(),
            "-i".into(),
            "-".into(),
        ];
        if self.row_order == RowOrder::BottomUp {
            args.push("-vf".into());
            args.push("vflip".into());
        }
        args.push("-vcodec".into());
        args.push(self.codec.clone());
        args.push(self.output_path().to_string_lossy().into_owned());
        args
    }
}

/// Sole writer into an encoder's input stream.
pub trait FrameSink: Send + Sync {
    /// Write one raw frame. Blocks while the encoder's pipe is full.
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), RecordingError>;

    /// Close the input stream and wait for the encoder to drain.
    fn finish(&mut self) -> Result<(), RecordingError>;
}

/// Starts encoder processes.
pub trait SinkLauncher: Send + Sync {
    fn launch(&mut self, config: &EncoderConfig) -> Result<Box<dyn FrameSink>, RecordingError>;
}

/// Launches the system ffmpeg.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegLauncher;

impl SinkLauncher for FfmpegLauncher {
    fn launch(&mut self, config: &EncoderConfig) -> Result<Box<dyn FrameSink>, RecordingError> {
        Ok(Box::new(FfmpegSink::spawn(config)?))
    }
}

/// A running ffmpeg process fed through its stdin.
pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn spawn(config: &EncoderConfig) -> Result<Self, RecordingError> {
        let mut child = Command::new(&config.program)
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(RecordingError::Spawn)?;
        let stdin = child.stdin.take();
        info!(
            "Recording to {} ({}x{} @ {} fps)",
            config.output_path().display(),
            config.width,
            config.height,
            config.fps
        );
        Ok(Self {
            child: Some(child),
            stdin,
        })
    }

    fn close_and_wait(&mut self) -> Result<(), RecordingError> {
        // Dropping stdin is the end-of-stream signal.
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(RecordingError::Flush)?;
        if status.success() {
            Ok(())
        } else {
            Err(RecordingError::Flush(io::Error::other(format!(
                "encoder exited with {}",
                status
            ))))
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), RecordingError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            RecordingError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "encoder input already closed",
            ))
        })?;
        stdin.write_all(bytes).map_err(RecordingError::Write)
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        self.close_and_wait()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.close_and_wait() {
                warn!("Recording output may be corrupt: {}", e);
            }
        }
    }
}
