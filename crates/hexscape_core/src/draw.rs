//! Instanced draw descriptor.
//!
//! [`HexInstancedDraw`] ties one mesh, one instance buffer and one colormap
//! buffer together with the live draw parameters. The buffers sit behind
//! `Arc`s and never change after construction; `z_scaling` is a separate
//! field so it can be tuned every frame without touching per-record data.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::extract_component::ExtractComponent;
use bytemuck::{Pod, Zeroable};

use crate::colormap::{ColormapBuffer, COLOR_STOP_STRIDE};
use crate::hex_mesh::MeshGeometry;
use crate::instance_buffer::{InstanceBuffer, INSTANCE_STRIDE};

/// Shader discriminant telling draws that share the prism program apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeomKind {
    /// Instanced hexagonal prisms.
    Hexagon,
    /// The single ground quad under the data.
    Floor,
}

impl GeomKind {
    /// Value passed to the shader as `geom_type`.
    pub const fn discriminant(self) -> i32 {
        match self {
            GeomKind::Hexagon => 1,
            GeomKind::Floor => -2,
        }
    }
}

/// Errors raised when a draw is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawError {
    /// Mesh has dangling indices or mismatched attribute counts.
    InconsistentMesh,
    /// Mesh has no triangles.
    EmptyMesh,
    /// Instance bytes are not a whole number of records.
    InstanceStride { len: usize },
    /// Colormap bytes are not a whole number of stops.
    ColormapStride { len: usize },
    /// A draw needs at least one colour stop.
    EmptyColormap,
    /// Vertical scale must be finite.
    NonFiniteScale(f32),
}

impl std::fmt::Display for DrawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawError::InconsistentMesh => write!(f, "mesh indices or normals are inconsistent"),
            DrawError::EmptyMesh => write!(f, "mesh has no triangles"),
            DrawError::InstanceStride { len } => write!(
                f,
                "instance buffer length {} is not a multiple of {}",
                len, INSTANCE_STRIDE
            ),
            DrawError::ColormapStride { len } => write!(
                f,
                "colormap buffer length {} is not a multiple of {}",
                len, COLOR_STOP_STRIDE
            ),
            DrawError::EmptyColormap => write!(f, "colormap buffer is empty"),
            DrawError::NonFiniteScale(z) => write!(f, "z scaling {} is not finite", z),
        }
    }
}

impl std::error::Error for DrawError {}

/// One instanced draw unit, attached to an entity in the main world and
/// mirrored into the render world every frame.
///
/// Buffers are produced once per session; only `z_scaling` changes, and the
/// render world never re-uploads vertex, instance or colormap data for it.
#[derive(Component, Clone, Debug, ExtractComponent)]
pub struct HexInstancedDraw {
    mesh: Arc<MeshGeometry>,
    instances: Arc<InstanceBuffer>,
    colormap: Arc<ColormapBuffer>,
    z_scaling: f32,
    kind: GeomKind,
}

impl HexInstancedDraw {
    /// Validate the schema once and build the draw unit.
    pub fn bind(
        mesh: MeshGeometry,
        instances: InstanceBuffer,
        colormap: ColormapBuffer,
        z_scaling: f32,
        kind: GeomKind,
    ) -> Result<Self, DrawError> {
        if !mesh.is_consistent() {
            return Err(DrawError::InconsistentMesh);
        }
        if mesh.triangle_count() == 0 {
            return Err(DrawError::EmptyMesh);
        }
        if instances.as_bytes().len() % INSTANCE_STRIDE != 0 {
            return Err(DrawError::InstanceStride {
                len: instances.as_bytes().len(),
            });
        }
        if colormap.as_bytes().len() % COLOR_STOP_STRIDE != 0 {
            return Err(DrawError::ColormapStride {
                len: colormap.as_bytes().len(),
            });
        }
        if colormap.is_empty() {
            return Err(DrawError::EmptyColormap);
        }
        if !z_scaling.is_finite() {
            return Err(DrawError::NonFiniteScale(z_scaling));
        }

        Ok(Self {
            mesh: Arc::new(mesh),
            instances: Arc::new(instances),
            colormap: Arc::new(colormap),
            z_scaling,
            kind,
        })
    }

    pub fn mesh(&self) -> &Arc<MeshGeometry> {
        &self.mesh
    }

    pub fn instances(&self) -> &Arc<InstanceBuffer> {
        &self.instances
    }

    pub fn colormap(&self) -> &Arc<ColormapBuffer> {
        &self.colormap
    }

    pub fn kind(&self) -> GeomKind {
        self.kind
    }

    pub fn z_scaling(&self) -> f32 {
        self.z_scaling
    }

    /// Change the vertical exaggeration. Buffers are left untouched.
    pub fn set_z_scaling(&mut self, z_scaling: f32) -> Result<(), DrawError> {
        if !z_scaling.is_finite() {
            return Err(DrawError::NonFiniteScale(z_scaling));
        }
        self.z_scaling = z_scaling;
        Ok(())
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.instance_count() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.mesh.indices.len() as u32
    }

    /// Zero-instance draws are skipped by the renderer.
    pub fn is_drawable(&self) -> bool {
        self.instance_count() > 0
    }

    /// Uniform block for the current frame.
    pub fn params(&self, light_position: Vec3) -> DrawParams {
        DrawParams {
            world_from_scene: world_from_scene().to_cols_array_2d(),
            light_position: light_position.extend(1.0).to_array(),
            colormap_length: self.colormap.len() as u32,
            geom_type: self.kind.discriminant(),
            z_scaling: self.z_scaling,
            _padding: 0.0,
        }
    }
}

/// Rotation from the Z-up scene frame into Bevy's Y-up world.
pub fn world_from_scene() -> Mat4 {
    Mat4::from_rotation_x(-FRAC_PI_2)
}

/// Draw uniform, group 1 binding 0 of the prism shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawParams {
    pub world_from_scene: [[f32; 4]; 4],
    pub light_position: [f32; 4],
    pub colormap_length: u32,
    pub geom_type: i32,
    pub z_scaling: f32,
    pub _padding: f32,
}
