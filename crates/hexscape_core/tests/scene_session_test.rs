//! End-to-end checks that run without a window or GPU: demo scene loading,
//! draw binding, and a recording session against an in-memory encoder.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bevy::time::TimeUpdateStrategy;
use hexscape_core::recording::{frame_step, CaptureStatus, Frame, SessionClock, StepStatus};
use hexscape_core::{
    build_scene_draws, load_scene_config, EncoderConfig, FrameSink, FrameSource, GeomKind,
    RecordingError, RecordingState, RecordingSettings, SceneConfig, SinkLauncher,
    INSTANCE_STRIDE,
};

fn demo_scene_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/scenes/demo.json")
}

#[derive(Default)]
struct MemoryLauncher {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    configs: Vec<EncoderConfig>,
}

struct MemorySink(Arc<Mutex<Vec<Vec<u8>>>>);

impl FrameSink for MemorySink {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), RecordingError> {
        self.0.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        Ok(())
    }
}

impl SinkLauncher for MemoryLauncher {
    fn launch(&mut self, config: &EncoderConfig) -> Result<Box<dyn FrameSink>, RecordingError> {
        self.configs.push(config.clone());
        Ok(Box::new(MemorySink(Arc::clone(&self.frames))))
    }
}

/// Solid frames, one shade per tick.
struct CountingSource {
    width: u32,
    height: u32,
    shades: VecDeque<u8>,
}

impl FrameSource for CountingSource {
    fn capture(&mut self) -> CaptureStatus {
        match self.shades.pop_front() {
            Some(shade) => {
                let len = (self.width * self.height * 4) as usize;
                match Frame::from_bgra(self.width, self.height, vec![shade; len]) {
                    Some(frame) => CaptureStatus::Ready(frame),
                    None => CaptureStatus::Unavailable,
                }
            }
            None => CaptureStatus::Unavailable,
        }
    }
}

#[test]
fn test_demo_scene_loads_and_binds() {
    let config = load_scene_config(demo_scene_path()).unwrap();
    assert_eq!(config.colormap.len(), 11);
    assert_eq!(config.labels.len(), 3);

    let draws = build_scene_draws(&config).unwrap();
    assert_eq!(draws.hexagons.kind(), GeomKind::Hexagon);
    assert_eq!(draws.hexagons.instance_count() as usize, config.records.len());
    assert_eq!(
        draws.hexagons.instances().as_bytes().len(),
        config.records.len() * INSTANCE_STRIDE
    );
    assert_eq!(draws.floor.kind(), GeomKind::Floor);
    assert_eq!(draws.floor.instance_count(), 1);
}

#[test]
fn test_demo_colormap_bands() {
    let config = load_scene_config(demo_scene_path()).unwrap();
    let draws = build_scene_draws(&config).unwrap();
    let colormap = draws.hexagons.colormap();

    assert_eq!(colormap.sample(500.0), [0.098, 0.902, 1.0]);
    assert_eq!(colormap.sample(1000.0), [0.298, 0.702, 1.0]);
    assert_eq!(colormap.sample(50_000.0), [0.702, 0.298, 1.0]);
}

#[test]
fn test_z_scaling_change_keeps_buffers() {
    let config = SceneConfig {
        records: vec![[0.0, 0.0, 5.0].into(), [1.0, 1.0, 7.0].into()],
        bounds: [-2.0, -2.0, 2.0, 2.0].into(),
        ..Default::default()
    };
    let mut draws = build_scene_draws(&config).unwrap();
    let before = draws.hexagons.instances().as_bytes().to_vec();

    draws.hexagons.set_z_scaling(3.0).unwrap();

    assert_eq!(draws.hexagons.z_scaling(), 3.0);
    assert_eq!(draws.hexagons.instances().as_bytes(), before.as_slice());
}

#[test]
fn test_recording_session_writes_all_but_first_frame() {
    let settings = RecordingSettings {
        fps: 30,
        ..RecordingSettings::new("session")
    };
    let mut pipeline = settings.pipeline();
    pipeline.configure_surface(4, 2, Default::default());

    let mut launcher = MemoryLauncher::default();
    let mut clock = TimeUpdateStrategy::default();
    assert_eq!(
        pipeline.start(&mut launcher, &mut clock),
        RecordingState::Recording
    );
    assert_eq!(clock.fixed_step(), Some(frame_step(30)));
    assert_eq!(launcher.configs[0].width, 4);
    assert_eq!(launcher.configs[0].output_path(), PathBuf::from("session.mp4"));

    let mut source = CountingSource {
        width: 4,
        height: 2,
        shades: (0..=10).collect(),
    };
    for _ in 0..=10 {
        assert_eq!(pipeline.step(&mut source), StepStatus::Continue);
    }
    pipeline.shutdown(&mut clock).unwrap();

    let frames = launcher.frames.lock().unwrap();
    assert_eq!(frames.len(), 10);
    assert!(frames.iter().all(|f| f.len() == 4 * 2 * 4));
    assert_eq!(frames[0][0], 1);
    assert_eq!(pipeline.state(), RecordingState::Closed);
    assert_eq!(clock.fixed_step(), None);
}
