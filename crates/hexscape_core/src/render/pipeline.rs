//! Render pipeline for instanced prisms and the ground quad.
//!
//! Both draw kinds share one program; `geom_type` in [`DrawParams`] picks the
//! branch. Bindings:
//! - group 0, binding 0: [`HexViewUniform`]
//! - group 1, binding 0: [`DrawParams`]
//! - group 1, binding 1: colormap, `array<vec4<f32>>` storage
//!
//! Vertex buffer 0 is the shared mesh ([`HexVertex`], per vertex), buffer 1
//! the instance buffer (12 bytes per instance, location 2).
//!
//! [`DrawParams`]: crate::draw::DrawParams

use bevy::core_pipeline::core_3d::CORE_3D_DEPTH_FORMAT;
use bevy::image::BevyDefault;
use bevy::prelude::*;
use bevy::render::{
    render_resource::{
        BindGroupLayout, BindGroupLayoutEntry, BindingType, BufferBindingType,
        CachedRenderPipelineId, ColorTargetState, ColorWrites, CompareFunction,
        DepthStencilState, FragmentState, MultisampleState, PipelineCache, PrimitiveState,
        RenderPipelineDescriptor, ShaderStages, StencilState, TextureFormat, VertexState,
    },
    renderer::RenderDevice,
};
use bevy_mesh::{VertexBufferLayout, VertexFormat};
use bytemuck::{Pod, Zeroable};

use crate::hex_mesh::HexVertex;
use crate::instance_buffer::INSTANCE_STRIDE;

/// Shader asset path, relative to the asset root.
pub const HEX_SHADER_PATH: &str = "shaders/hex_prism.wgsl";

/// Per-view uniform for the prism pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct HexViewUniform {
    pub clip_from_world: [[f32; 4]; 4],
}

#[derive(Resource)]
pub struct HexPipeline {
    pub pipeline_id: CachedRenderPipelineId,
    pub view_layout: BindGroupLayout,
    pub draw_layout: BindGroupLayout,
}

/// Per-instance layout: `(x, y, value)` as one `vec3<f32>` at location 2.
pub fn instance_buffer_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        array_stride: INSTANCE_STRIDE as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: vec![wgpu::VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 0,
            shader_location: 2,
        }],
    }
}

fn uniform_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::VERTEX_FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Create the layouts and queue the pipeline once.
pub fn init_hex_pipeline(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    pipeline_cache: Res<PipelineCache>,
    asset_server: Res<AssetServer>,
    existing: Option<Res<HexPipeline>>,
) {
    if existing.is_some() {
        return;
    }

    let view_layout = render_device.create_bind_group_layout("hex_view_layout", &[uniform_entry(0)]);

    let draw_layout = render_device.create_bind_group_layout(
        "hex_draw_layout",
        &[
            uniform_entry(0),
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );

    let shader = asset_server.load(HEX_SHADER_PATH);

    let pipeline_id = pipeline_cache.queue_render_pipeline(RenderPipelineDescriptor {
        label: Some("hex_prism_pipeline".into()),
        layout: vec![view_layout.clone(), draw_layout.clone()],
        push_constant_ranges: vec![],
        vertex: VertexState {
            shader: shader.clone(),
            shader_defs: vec![],
            entry_point: Some("vertex".into()),
            buffers: vec![HexVertex::vertex_buffer_layout(), instance_buffer_layout()],
        },
        primitive: PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: CORE_3D_DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::GreaterEqual, // Reverse-Z
            stencil: StencilState::default(),
            bias: Default::default(),
        }),
        multisample: MultisampleState::default(),
        fragment: Some(FragmentState {
            shader,
            shader_defs: vec![],
            entry_point: Some("fragment".into()),
            targets: vec![Some(ColorTargetState {
                format: TextureFormat::bevy_default(),
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
        }),
        zero_initialize_workgroup_memory: false,
    });

    commands.insert_resource(HexPipeline {
        pipeline_id,
        view_layout,
        draw_layout,
    });

    info!("Hex prism pipeline queued");
}
