//! Prepare phase systems for the prism pass.
//!
//! Mesh, instance and colormap data are uploaded once per draw.
//! The small [`DrawParams`] uniform is rewritten every frame, which is all a
//! `z_scaling` change costs.

use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::{
    camera::ExtractedCamera,
    extract_component::ExtractComponent,
    extract_resource::ExtractResource,
    render_resource::{
        BindGroup, BindGroupEntry, Buffer, BufferInitDescriptor, BufferUsages,
    },
    renderer::{RenderDevice, RenderQueue},
    view::ExtractedView,
};

use super::pipeline::{HexPipeline, HexViewUniform};
use crate::colormap::ColormapBuffer;
use crate::draw::{DrawParams, GeomKind, HexInstancedDraw};
use crate::hex_mesh::MeshGeometry;
use crate::instance_buffer::InstanceBuffer;

/// Marks the camera the prism pass renders into.
///
/// The camera must render without MSAA and without HDR.
#[derive(Component, Clone, Copy, Default, ExtractComponent)]
pub struct HexCamera;

/// Light position in scene space (Z-up), shared by every draw.
#[derive(Resource, Clone, Copy, Debug, ExtractResource)]
pub struct SceneLight {
    pub position: Vec3,
}

impl Default for SceneLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(-5.0, -5.0, 3.0),
        }
    }
}

/// GPU-side copy of one [`HexInstancedDraw`].
#[derive(Component)]
pub struct GpuHexDraw {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    /// `None` for a zero-instance draw.
    pub instance_buffer: Option<Buffer>,
    pub params_buffer: Buffer,
    #[allow(dead_code)]
    pub colormap_buffer: Buffer, // Kept alive to back the bind group
    pub bind_group: BindGroup,
    pub index_count: u32,
    pub instance_count: u32,
    pub kind: GeomKind,
    mesh: Arc<MeshGeometry>,
    instances: Arc<InstanceBuffer>,
    colormap: Arc<ColormapBuffer>,
}

impl GpuHexDraw {
    fn is_current(&self, draw: &HexInstancedDraw) -> bool {
        Arc::ptr_eq(&self.mesh, draw.mesh())
            && Arc::ptr_eq(&self.instances, draw.instances())
            && Arc::ptr_eq(&self.colormap, draw.colormap())
    }
}

/// Per-view bind group for group 0.
#[derive(Component)]
pub struct HexViewBindGroup {
    #[allow(dead_code)]
    pub buffer: Buffer, // Kept alive to back the bind group
    pub bind_group: BindGroup,
}

/// One ready-to-issue draw for the node.
pub struct QueuedHexDraw {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub instance_buffer: Buffer,
    pub bind_group: BindGroup,
    pub index_count: u32,
    pub instance_count: u32,
}

/// Draws for this frame, floor first.
#[derive(Resource, Default)]
pub struct HexDrawQueue {
    pub draws: Vec<QueuedHexDraw>,
}

/// Upload new or changed draws and refresh every draw's uniform.
pub fn prepare_hex_draws(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    pipeline: Option<Res<HexPipeline>>,
    light: Option<Res<SceneLight>>,
    draws: Query<(Entity, &HexInstancedDraw, Option<&GpuHexDraw>)>,
) {
    let Some(pipeline) = pipeline else {
        return;
    };
    let light = light.map(|l| l.position).unwrap_or(SceneLight::default().position);

    for (entity, draw, gpu) in draws.iter() {
        let params = draw.params(light);
        match gpu {
            Some(gpu) if gpu.is_current(draw) => {
                render_queue.write_buffer(&gpu.params_buffer, 0, bytemuck::bytes_of(&params));
            }
            _ => {
                let gpu = upload_draw(&render_device, &pipeline, draw, &params);
                debug!(
                    "Uploaded {:?} draw: {} instances, {} indices",
                    gpu.kind, gpu.instance_count, gpu.index_count
                );
                commands.entity(entity).insert(gpu);
            }
        }
    }
}

fn upload_draw(
    render_device: &RenderDevice,
    pipeline: &HexPipeline,
    draw: &HexInstancedDraw,
    params: &DrawParams,
) -> GpuHexDraw {
    let vertices = draw.mesh().interleaved();
    let vertex_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("hex_vertex_buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: BufferUsages::VERTEX,
    });

    let index_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("hex_index_buffer"),
        contents: bytemuck::cast_slice(&draw.mesh().indices),
        usage: BufferUsages::INDEX,
    });

    let instance_buffer = (!draw.instances().is_empty()).then(|| {
        render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("hex_instance_buffer"),
            contents: draw.instances().as_bytes(),
            usage: BufferUsages::VERTEX,
        })
    });

    let params_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("hex_draw_params"),
        contents: bytemuck::bytes_of(params),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });

    let colormap_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("hex_colormap"),
        contents: draw.colormap().as_bytes(),
        usage: BufferUsages::STORAGE,
    });

    let bind_group = render_device.create_bind_group(
        Some("hex_draw_bind_group"),
        &pipeline.draw_layout,
        &[
            BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: colormap_buffer.as_entire_binding(),
            },
        ],
    );

    GpuHexDraw {
        vertex_buffer,
        index_buffer,
        instance_buffer,
        params_buffer,
        colormap_buffer,
        bind_group,
        index_count: draw.index_count(),
        instance_count: draw.instance_count(),
        kind: draw.kind(),
        mesh: Arc::clone(draw.mesh()),
        instances: Arc::clone(draw.instances()),
        colormap: Arc::clone(draw.colormap()),
    }
}

/// Collect drawable entities for the node, floor first. Zero-instance
/// draws are left out.
pub fn queue_hex_draws(mut queue: ResMut<HexDrawQueue>, draws: Query<&GpuHexDraw>) {
    queue.draws.clear();
    let floors = draws.iter().filter(|g| g.kind == GeomKind::Floor);
    let prisms = draws.iter().filter(|g| g.kind != GeomKind::Floor);
    for gpu in floors.chain(prisms) {
        let Some(instance_buffer) = gpu.instance_buffer.clone() else {
            continue;
        };
        queue.draws.push(QueuedHexDraw {
            vertex_buffer: gpu.vertex_buffer.clone(),
            index_buffer: gpu.index_buffer.clone(),
            instance_buffer,
            bind_group: gpu.bind_group.clone(),
            index_count: gpu.index_count,
            instance_count: gpu.instance_count,
        });
    }
}

/// Build the view uniform for every prism camera.
pub fn prepare_hex_view_uniforms(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    pipeline: Option<Res<HexPipeline>>,
    cameras: Query<(Entity, &ExtractedView), (With<ExtractedCamera>, With<HexCamera>)>,
) {
    let Some(pipeline) = pipeline else {
        return;
    };

    for (entity, view) in cameras.iter() {
        let world_from_view = view.world_from_view.to_matrix();
        let clip_from_world = view
            .clip_from_world
            .unwrap_or(view.clip_from_view * world_from_view.inverse());
        let uniform = HexViewUniform {
            clip_from_world: clip_from_world.to_cols_array_2d(),
        };

        let buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("hex_view_uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: BufferUsages::UNIFORM,
        });

        let bind_group = render_device.create_bind_group(
            Some("hex_view_bind_group"),
            &pipeline.view_layout,
            &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        );

        commands
            .entity(entity)
            .insert(HexViewBindGroup { buffer, bind_group });
    }
}
