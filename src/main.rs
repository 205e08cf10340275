//! Hexscape viewer.
//!
//! Usage: `hexscape [scene.json] [recording-output]`
//!
//! Without arguments the demo scene is shown. A second argument records the
//! session to `<recording-output>.mp4` (ffmpeg must be on the PATH).

use std::process::ExitCode;

use hexscape_core::{load_scene_config, HexSceneApp};

const DEFAULT_SCENE: &str = "assets/scenes/demo.json";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let scene_path = args.next().unwrap_or_else(|| DEFAULT_SCENE.to_string());

    let mut config = match load_scene_config(&scene_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load scene {}: {}", scene_path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(output) = args.next() {
        let mut settings = config.recording.take().unwrap_or_default();
        settings.output = output.into();
        config.recording = Some(settings);
    }

    match HexSceneApp::new("Hexscape").with_config(config).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to build scene: {}", e);
            ExitCode::FAILURE
        }
    }
}
