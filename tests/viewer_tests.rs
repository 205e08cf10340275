//! Windowed viewer checks.
//!
//! NOTE: winit must own the main thread, so the viewer cannot be driven
//! from `cargo test`. Run it through the binary instead:
//!
//! - `cargo run` shows `assets/scenes/demo.json`
//! - `cargo run -- assets/scenes/demo.json demo` also records `demo.mp4`
//!   (needs ffmpeg on the PATH)

use std::path::Path;

const DEMO_SCENE: &str = "assets/scenes/demo.json";

#[test]
fn viewer_runs_are_manual() {
    println!("Viewer checks must be run through the binary:");
    println!("  cargo run");
    println!("  cargo run -- {} demo", DEMO_SCENE);
}

#[test]
fn demo_scene_is_shipped() {
    assert!(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEMO_SCENE).exists());
}
