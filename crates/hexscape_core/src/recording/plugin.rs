//! Bevy integration for the recording pipeline.
//!
//! Each `Update` while recording requests a screenshot of the primary window
//! and steps the pipeline once. Frames arrive through
//! [`ScreenshotFrameSource`] a frame or two after they are requested. On
//! `AppExit` the already-delivered frames are flushed, the encoder input is
//! closed and the process is waited on before the app returns.

use std::path::PathBuf;

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::render::view::screenshot::Screenshot;
use bevy::time::TimeUpdateStrategy;
use bevy::window::PrimaryWindow;
use serde::{Deserialize, Serialize};

use super::capture::{FrameSource, ScreenshotFrameSource};
use super::clock::SessionClock;
use super::encoder::{default_program, EncoderConfig, FfmpegLauncher, SinkLauncher};
use super::pipeline::{RecordingPipeline, RecordingState, StepStatus};

/// User-facing recording options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Output base name; the container extension is appended.
    pub output: PathBuf,
    pub fps: u32,
    pub codec: String,
    /// Encoder executable.
    pub program: String,
    /// Optional PNG of the first recorded frame.
    pub poster: Option<PathBuf>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("recording"),
            fps: 60,
            codec: "libx264".to_string(),
            program: default_program(),
            poster: None,
        }
    }
}

impl RecordingSettings {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..default()
        }
    }

    /// Encoder config for a `width × height` surface.
    pub fn encoder_config(&self, width: u32, height: u32) -> EncoderConfig {
        EncoderConfig::new(self.output.clone(), width, height)
            .with_fps(self.fps)
            .with_codec(self.codec.clone())
            .with_program(self.program.clone())
    }

    /// Armed pipeline; the surface size is filled in when recording starts.
    pub fn pipeline(&self) -> RecordingPipeline {
        let pipeline = RecordingPipeline::armed(self.encoder_config(0, 0));
        match &self.poster {
            Some(path) => pipeline.with_poster(path.clone()),
            None => pipeline,
        }
    }
}

/// Launcher used to start the encoder.
#[derive(Resource)]
pub struct RecordingLauncher(pub Box<dyn SinkLauncher>);

impl Default for RecordingLauncher {
    fn default() -> Self {
        Self(Box::new(FfmpegLauncher))
    }
}

/// Adds frame capture, Escape-to-quit and the exit-time encoder flush.
///
/// With `settings: None` the pipeline stays `Idle` and no encoder is ever
/// spawned.
#[derive(Default)]
pub struct RecordingPlugin {
    pub settings: Option<RecordingSettings>,
}

impl RecordingPlugin {
    pub fn new(settings: Option<RecordingSettings>) -> Self {
        Self { settings }
    }
}

impl Plugin for RecordingPlugin {
    fn build(&self, app: &mut App) {
        let pipeline = self
            .settings
            .as_ref()
            .map(RecordingSettings::pipeline)
            .unwrap_or_default();

        app.insert_resource(pipeline)
            .init_resource::<RecordingLauncher>()
            .init_resource::<ScreenshotFrameSource>()
            .init_resource::<TimeUpdateStrategy>()
            .add_systems(
                Update,
                (
                    start_recording.run_if(recording_in(RecordingState::Armed)),
                    request_frame.run_if(recording_in(RecordingState::Recording)),
                    step_recording.run_if(recording_in(RecordingState::Recording)),
                )
                    .chain(),
            )
            .add_systems(Update, quit_on_escape)
            .add_systems(Last, finish_recording_on_exit);
    }
}

fn recording_in(state: RecordingState) -> impl Fn(Res<RecordingPipeline>) -> bool + Clone {
    move |pipeline: Res<RecordingPipeline>| pipeline.state() == state
}

fn start_recording(
    mut pipeline: ResMut<RecordingPipeline>,
    mut launcher: ResMut<RecordingLauncher>,
    mut clock: ResMut<TimeUpdateStrategy>,
    source: Res<ScreenshotFrameSource>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    pipeline.configure_surface(
        window.physical_width(),
        window.physical_height(),
        source.row_order(),
    );
    let state = pipeline.start(launcher.0.as_mut(), clock.as_mut());
    debug!("Recording pipeline is {:?}", state);
}

fn request_frame(mut commands: Commands, source: Res<ScreenshotFrameSource>) {
    commands
        .spawn(Screenshot::primary_window())
        .observe(source.forwarder());
}

fn step_recording(
    mut pipeline: ResMut<RecordingPipeline>,
    mut source: ResMut<ScreenshotFrameSource>,
    mut clock: ResMut<TimeUpdateStrategy>,
) {
    if pipeline.step(source.as_mut()) == StepStatus::Stop {
        clock.set_realtime();
        warn!("Recording stopped; rendering continues without capture");
    }
}

#[allow(deprecated)]
fn quit_on_escape(keys: Res<ButtonInput<KeyCode>>, mut exit: EventWriter<AppExit>) {
    if keys.just_pressed(KeyCode::Escape) {
        info!("Escape pressed, exiting");
        exit.write(AppExit::Success);
    }
}

#[allow(deprecated)]
fn finish_recording_on_exit(
    mut exits: EventReader<AppExit>,
    mut pipeline: ResMut<RecordingPipeline>,
    mut source: ResMut<ScreenshotFrameSource>,
    mut clock: ResMut<TimeUpdateStrategy>,
) {
    if exits.read().next().is_none() {
        return;
    }
    exits.clear();

    while pipeline.state() == RecordingState::Recording && source.pending() > 0 {
        pipeline.step(source.as_mut());
    }
    // Failures are already logged; the app exits either way.
    let _ = pipeline.shutdown(clock.as_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Frame, FrameSink, RecordingError, RowOrder};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        finished: Arc<Mutex<bool>>,
        fail_writes: bool,
    }

    impl FrameSink for SharedSink {
        fn write_frame(&mut self, bytes: &[u8]) -> Result<(), RecordingError> {
            if self.fail_writes {
                return Err(RecordingError::Write(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "encoder died",
                )));
            }
            self.frames.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RecordingError> {
            *self.finished.lock().unwrap() = true;
            Ok(())
        }
    }

    impl SinkLauncher for SharedSink {
        fn launch(&mut self, _: &EncoderConfig) -> Result<Box<dyn FrameSink>, RecordingError> {
            Ok(Box::new(self.clone()))
        }
    }

    fn solid_frame(shade: u8) -> Frame {
        Frame::from_bgra(2, 2, vec![shade; 16]).unwrap()
    }

    /// Headless app whose pipeline is already recording into `sink`.
    fn recording_app(sink: &SharedSink) -> App {
        let mut launcher = sink.clone();
        let mut clock = TimeUpdateStrategy::default();
        let mut pipeline = RecordingSettings::new("clip").pipeline();
        pipeline.configure_surface(2, 2, RowOrder::TopDown);
        assert_eq!(
            pipeline.start(&mut launcher, &mut clock),
            RecordingState::Recording
        );

        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<ButtonInput<KeyCode>>()
            .add_plugins(RecordingPlugin::default())
            .insert_resource(pipeline)
            .insert_resource(clock);
        app
    }

    #[test]
    fn test_settings_defaults() {
        let settings = RecordingSettings::default();
        assert_eq!(settings.output, PathBuf::from("recording"));
        assert_eq!(settings.fps, 60);
        assert_eq!(settings.codec, "libx264");
        assert_eq!(settings.program, default_program());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: RecordingSettings =
            serde_json::from_str(r#"{"output": "renders/france", "fps": 30}"#).unwrap();
        assert_eq!(settings.output, PathBuf::from("renders/france"));
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.codec, "libx264");
    }

    #[test]
    fn test_settings_build_armed_pipeline() {
        let pipeline = RecordingSettings::new("clip").pipeline();
        assert_eq!(pipeline.state(), RecordingState::Armed);
        let config = pipeline.config().unwrap();
        assert_eq!(config.output_path(), PathBuf::from("clip.mp4"));
    }

    #[test]
    fn test_escape_flushes_and_closes_recording() {
        let sink = SharedSink::default();
        let mut app = recording_app(&sink);
        let source = app.world().resource::<ScreenshotFrameSource>().clone();
        for shade in [10, 20, 30] {
            source.deliver(solid_frame(shade));
        }

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::Escape);
        app.update();

        assert!(app.should_exit().is_some());
        let pipeline = app.world().resource::<RecordingPipeline>();
        assert_eq!(pipeline.state(), RecordingState::Closed);
        assert_eq!(pipeline.frames_written(), 2);
        assert_eq!(source.pending(), 0);
        assert!(*sink.finished.lock().unwrap());

        let frames = sink.frames.lock().unwrap();
        let shades: Vec<u8> = frames.iter().map(|f| f[0]).collect();
        assert_eq!(shades, vec![20, 30]);

        let clock = app.world().resource::<TimeUpdateStrategy>();
        assert!(matches!(clock, TimeUpdateStrategy::Automatic));
    }

    #[test]
    fn test_write_failure_releases_clock() {
        let sink = SharedSink {
            fail_writes: true,
            ..Default::default()
        };
        let mut app = recording_app(&sink);
        assert!(app
            .world()
            .resource::<TimeUpdateStrategy>()
            .fixed_step()
            .is_some());

        let source = app.world().resource::<ScreenshotFrameSource>().clone();
        source.deliver(solid_frame(1));
        source.deliver(solid_frame(2));
        app.update();
        app.update();

        let pipeline = app.world().resource::<RecordingPipeline>();
        assert_eq!(pipeline.state(), RecordingState::Closed);
        assert!(matches!(pipeline.last_error(), Some(RecordingError::Write(_))));
        assert!(*sink.finished.lock().unwrap());
        assert_eq!(
            app.world().resource::<TimeUpdateStrategy>().fixed_step(),
            None
        );
    }

    #[test]
    fn test_plugin_without_settings_stays_idle() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<ButtonInput<KeyCode>>()
            .add_plugins(RecordingPlugin::default());
        app.update();
        app.update();

        let pipeline = app.world().resource::<RecordingPipeline>();
        assert_eq!(pipeline.state(), RecordingState::Idle);
        assert_eq!(pipeline.frames_written(), 0);
    }
}
