//! Core library for Hexscape, a hexagonal-prism map renderer.
//!
//! This crate provides:
//! - Hexagonal prism and ground quad geometry
//! - Per-instance and colormap buffer encoding
//! - Instanced draw binding and the render-graph pass that draws it
//! - Map labels (leader lines and screen-space text)
//! - Frame recording through an external ffmpeg encoder
//! - Scene files and an app builder tying it together

use bevy::prelude::*;

pub mod colormap;
pub mod draw;
pub mod geo;
pub mod hex_mesh;
pub mod instance_buffer;
pub mod labels;
pub mod recording;
pub mod render;
pub mod scene;

pub use colormap::{
    default_colormap, sample_stops, ColorStop, ColorStopData, ColormapBuffer, EncodeError,
    COLOR_STOP_STRIDE,
};
pub use draw::{world_from_scene, DrawError, DrawParams, GeomKind, HexInstancedDraw};
pub use geo::{Bounds, Record, SceneTransform, HORIZONTAL_STRETCH};
pub use hex_mesh::{
    build_ground_quad, build_hexagon_prism, GeometryError, HexVertex, MeshGeometry,
    HEX_INDEX_COUNT, HEX_VERTEX_COUNT,
};
pub use instance_buffer::{write_instances, InstanceBuffer, InstanceData, INSTANCE_STRIDE};
pub use labels::{spawn_labels, LabelPlugin, MapLabel, MapLabelText, SceneLabel};
pub use recording::{
    EncoderConfig, FfmpegLauncher, FrameSink, FrameSource, RecordingError, RecordingPipeline,
    RecordingPlugin, RecordingSettings, RecordingState, SinkLauncher,
};
pub use render::{HexCamera, HexLabel, HexRenderPlugin, SceneLight};
pub use scene::{
    build_scene_draws, camera_transform, load_scene_config, save_scene_config, HexSceneApp,
    SceneConfig, SceneDraws, SceneIoError,
};

/// Rendering and labels for apps that manage their own window and camera.
///
/// Recording is not included; add [`RecordingPlugin`] separately.
pub struct HexScenePlugin;

impl Plugin for HexScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(HexRenderPlugin).add_plugins(LabelPlugin);
    }
}
