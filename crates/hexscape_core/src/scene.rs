//! Scene description and the app builder.
//!
//! # Example
//!
//! ```ignore
//! use hexscape_core::{HexSceneApp, Record};
//!
//! HexSceneApp::new("Hexscape")
//!     .with_records(vec![Record::new(2.35, 48.85, 1200.0)])
//!     .with_bounds([-5.15, 41.33, 9.57, 51.09].into())
//!     .with_z_scaling(1.0 / 10000.0)
//!     .run()
//!     .unwrap();
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bevy::prelude::*;
use bevy::window::WindowPlugin;
use serde::{Deserialize, Serialize};

use crate::colormap::{default_colormap, ColorStop, ColormapBuffer, EncodeError};
use crate::draw::{world_from_scene, DrawError, GeomKind, HexInstancedDraw};
use crate::geo::{Bounds, Record, SceneTransform};
use crate::hex_mesh::{build_ground_quad, build_hexagon_prism, GeometryError};
use crate::instance_buffer::InstanceBuffer;
use crate::labels::{spawn_labels, SceneLabel};
use crate::recording::{RecordingPlugin, RecordingSettings};
use crate::render::{HexCamera, SceneLight};
use crate::HexScenePlugin;

/// Floor extends this fraction past the bounds on every side.
pub const FLOOR_MARGIN: f64 = 0.1;

/// Scene-space height of the floor quad.
pub const FLOOR_HEIGHT: f32 = -0.1;

/// Everything needed to render one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub records: Vec<Record>,
    pub bounds: Bounds,
    /// Vertical exaggeration applied to record values.
    pub z_scaling: f32,
    pub colormap: Vec<ColorStop>,
    /// Prism radius and base height.
    pub hex_size: f32,
    pub window_size: (u32, u32),
    /// Camera height above the scene centre.
    pub camera_height: f32,
    /// Light position in scene space.
    pub light_position: [f32; 3],
    pub recording: Option<RecordingSettings>,
    pub labels: Vec<SceneLabel>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            bounds: Bounds::default(),
            z_scaling: 1.0,
            colormap: default_colormap(),
            hex_size: 0.018,
            window_size: (1280, 720),
            camera_height: 15.0,
            light_position: [-5.0, -5.0, 3.0],
            recording: None,
            labels: Vec::new(),
        }
    }
}

/// Errors that can occur while loading or building a scene.
#[derive(Debug)]
pub enum SceneIoError {
    /// File system error
    Io(std::io::Error),
    /// Malformed JSON
    Json(serde_json::Error),
    /// Well-formed but unusable value
    Invalid(String),
    Geometry(GeometryError),
    Colormap(EncodeError),
    Draw(DrawError),
}

impl std::fmt::Display for SceneIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneIoError::Io(e) => write!(f, "IO error: {}", e),
            SceneIoError::Json(e) => write!(f, "JSON error: {}", e),
            SceneIoError::Invalid(msg) => write!(f, "Invalid scene: {}", msg),
            SceneIoError::Geometry(e) => write!(f, "Geometry error: {}", e),
            SceneIoError::Colormap(e) => write!(f, "Colormap error: {}", e),
            SceneIoError::Draw(e) => write!(f, "Draw error: {}", e),
        }
    }
}

impl std::error::Error for SceneIoError {}

impl From<std::io::Error> for SceneIoError {
    fn from(e: std::io::Error) -> Self {
        SceneIoError::Io(e)
    }
}

impl From<serde_json::Error> for SceneIoError {
    fn from(e: serde_json::Error) -> Self {
        SceneIoError::Json(e)
    }
}

impl From<GeometryError> for SceneIoError {
    fn from(e: GeometryError) -> Self {
        SceneIoError::Geometry(e)
    }
}

impl From<EncodeError> for SceneIoError {
    fn from(e: EncodeError) -> Self {
        SceneIoError::Colormap(e)
    }
}

impl From<DrawError> for SceneIoError {
    fn from(e: DrawError) -> Self {
        SceneIoError::Draw(e)
    }
}

/// Load a scene from a JSON file.
pub fn load_scene_config(path: impl AsRef<Path>) -> Result<SceneConfig, SceneIoError> {
    let file = File::open(path.as_ref())?;
    let config: SceneConfig = serde_json::from_reader(BufReader::new(file))?;
    validate_config(&config)?;
    Ok(config)
}

/// Save a scene as pretty-printed JSON.
pub fn save_scene_config(config: &SceneConfig, path: impl AsRef<Path>) -> Result<(), SceneIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    Ok(())
}

fn validate_config(config: &SceneConfig) -> Result<(), SceneIoError> {
    let (w, h) = config.window_size;
    if w == 0 || h == 0 {
        return Err(SceneIoError::Invalid(format!("window size {}x{}", w, h)));
    }
    let b = &config.bounds;
    if !(b.xmin <= b.xmax && b.ymin <= b.ymax) {
        return Err(SceneIoError::Invalid(format!("bounds {:?} are inverted", b)));
    }
    Ok(())
}

/// The two draws of a session: floor and prisms.
#[derive(Clone, Debug)]
pub struct SceneDraws {
    pub floor: HexInstancedDraw,
    pub hexagons: HexInstancedDraw,
    pub transform: SceneTransform,
}

/// Build the mesh, encode both buffers and bind the draws.
///
/// An empty colormap falls back to the default ramp with a warning; an
/// empty record set yields a prism draw with zero instances.
pub fn build_scene_draws(config: &SceneConfig) -> Result<SceneDraws, SceneIoError> {
    validate_config(config)?;
    let transform = config.bounds.scene_transform();

    let stops = if config.colormap.is_empty() {
        warn!("Scene has no colormap, using the default ramp");
        default_colormap()
    } else {
        config.colormap.clone()
    };
    let colormap = ColormapBuffer::encode(&stops)?;

    if config.records.is_empty() {
        warn!("Scene has no records, nothing to draw");
    }
    let instances = InstanceBuffer::encode(&config.records, transform.midpoint);
    let hexagons = HexInstancedDraw::bind(
        build_hexagon_prism(config.hex_size)?,
        instances,
        colormap.clone(),
        config.z_scaling,
        GeomKind::Hexagon,
    )?;

    let (min, max) = transform.padded_rect(&config.bounds, FLOOR_MARGIN);
    let floor = HexInstancedDraw::bind(
        build_ground_quad(min, max, FLOOR_HEIGHT),
        // One instance at the origin; the floor ignores instance data.
        InstanceBuffer::encode(&[Record::new(0.0, 0.0, 0.0)], (0.0, 0.0)),
        colormap,
        config.z_scaling,
        GeomKind::Floor,
    )?;

    info!(
        "Scene ready: {} records, {} colour stops",
        hexagons.instance_count(),
        hexagons.colormap().len()
    );

    Ok(SceneDraws {
        floor,
        hexagons,
        transform,
    })
}

/// Builder for a hexscape viewer app.
pub struct HexSceneApp {
    title: String,
    config: SceneConfig,
    clear_color: Color,
}

impl HexSceneApp {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            config: SceneConfig::default(),
            clear_color: Color::srgb(0.02, 0.02, 0.03),
        }
    }

    /// Replace the whole scene description.
    pub fn with_config(mut self, config: SceneConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.config.records = records;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.config.bounds = bounds;
        self
    }

    pub fn with_z_scaling(mut self, z_scaling: f32) -> Self {
        self.config.z_scaling = z_scaling;
        self
    }

    pub fn with_colormap(mut self, colormap: Vec<ColorStop>) -> Self {
        self.config.colormap = colormap;
        self
    }

    pub fn with_hex_size(mut self, size: f32) -> Self {
        self.config.hex_size = size;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.window_size = (width, height);
        self
    }

    pub fn with_camera_height(mut self, height: f32) -> Self {
        self.config.camera_height = height;
        self
    }

    pub fn with_light_position(mut self, position: Vec3) -> Self {
        self.config.light_position = position.to_array();
        self
    }

    pub fn with_recording(mut self, settings: RecordingSettings) -> Self {
        self.config.recording = Some(settings);
        self
    }

    pub fn with_label(mut self, label: SceneLabel) -> Self {
        self.config.labels.push(label);
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Build the draws and the Bevy app without running it.
    pub fn build(self) -> Result<App, SceneIoError> {
        let draws = build_scene_draws(&self.config)?;
        let [lx, ly, lz] = self.config.light_position;

        let mut app = App::new();
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                resolution: self.config.window_size.into(),
                title: self.title.clone(),
                ..default()
            }),
            ..default()
        }));

        app.add_plugins(HexScenePlugin)
            .add_plugins(RecordingPlugin::new(self.config.recording.clone()));

        app.insert_resource(ClearColor(self.clear_color))
            .insert_resource(SceneLight {
                position: Vec3::new(lx, ly, lz),
            })
            .insert_resource(PendingScene {
                draws: Some(draws),
                labels: self.config.labels.clone(),
                camera_height: self.config.camera_height,
            })
            .add_systems(Startup, setup_scene);

        Ok(app)
    }

    /// Build and run until the window closes or Escape is pressed.
    pub fn run(self) -> Result<(), SceneIoError> {
        let mut app = self.build()?;
        app.run();
        Ok(())
    }
}

#[derive(Resource)]
struct PendingScene {
    draws: Option<SceneDraws>,
    labels: Vec<SceneLabel>,
    camera_height: f32,
}

/// Camera straight above the scene centre, scene north at the top of the
/// screen.
pub fn camera_transform(height: f32) -> Transform {
    let eye = world_from_scene().transform_point3(Vec3::new(0.0, 0.0, height));
    let north = world_from_scene().transform_vector3(Vec3::Y);
    Transform::from_translation(eye).looking_at(Vec3::ZERO, north)
}

fn setup_scene(mut commands: Commands, mut pending: ResMut<PendingScene>) {
    let Some(draws) = pending.draws.take() else {
        return;
    };

    commands.spawn((
        Camera3d::default(),
        Msaa::Off,
        camera_transform(pending.camera_height),
        HexCamera,
    ));

    commands.spawn((Name::new("Floor"), draws.floor));
    commands.spawn((Name::new("Hexagons"), draws.hexagons));

    spawn_labels(&mut commands, &pending.labels, &draws.transform);
}
