//! Render-world plumbing for [`HexInstancedDraw`](crate::draw::HexInstancedDraw).
//!
//! ```text
//! main world                 render world
//! HexInstancedDraw ──extract──> prepare_hex_draws ──> GpuHexDraw
//! HexCamera        ──extract──> prepare_hex_view_uniforms
//! SceneLight       ──extract──> (DrawParams.light_position)
//!                               queue_hex_draws ──> HexDrawQueue ──> HexPassNode
//! ```
//!
//! The pass runs between the main opaque and transparent passes of `Core3d`.

mod node;
mod pipeline;
mod prepare;

pub use node::HexPassNode;
pub use pipeline::{instance_buffer_layout, HexPipeline, HexViewUniform, HEX_SHADER_PATH};
pub use prepare::{GpuHexDraw, HexCamera, HexDrawQueue, HexViewBindGroup, SceneLight};

use bevy::core_pipeline::core_3d::graph::{Core3d, Node3d};
use bevy::prelude::*;
use bevy::render::{
    extract_component::ExtractComponentPlugin,
    extract_resource::ExtractResourcePlugin,
    render_graph::{RenderGraphExt, RenderLabel, ViewNodeRunner},
    Render, RenderApp, RenderSystems,
};

use crate::draw::HexInstancedDraw;
use pipeline::init_hex_pipeline;
use prepare::{prepare_hex_draws, prepare_hex_view_uniforms, queue_hex_draws};

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub enum HexLabel {
    /// Instanced prisms and the ground quad.
    HexPass,
}

/// Renders every [`HexInstancedDraw`] for cameras marked [`HexCamera`].
pub struct HexRenderPlugin;

impl Plugin for HexRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneLight>();

        app.add_plugins(ExtractComponentPlugin::<HexInstancedDraw>::default());
        app.add_plugins(ExtractComponentPlugin::<HexCamera>::default());
        app.add_plugins(ExtractResourcePlugin::<SceneLight>::default());

        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            warn!("RenderApp not found - hex rendering disabled");
            return;
        };

        render_app.init_resource::<HexDrawQueue>();

        render_app.add_systems(
            Render,
            (
                init_hex_pipeline.in_set(RenderSystems::Prepare),
                prepare_hex_draws
                    .in_set(RenderSystems::PrepareResources)
                    .after(init_hex_pipeline),
                prepare_hex_view_uniforms
                    .in_set(RenderSystems::PrepareResources)
                    .after(init_hex_pipeline),
                queue_hex_draws.in_set(RenderSystems::PrepareBindGroups),
            ),
        );

        render_app
            .add_render_graph_node::<ViewNodeRunner<HexPassNode>>(Core3d, HexLabel::HexPass)
            .add_render_graph_edges(
                Core3d,
                (
                    Node3d::MainOpaquePass,
                    HexLabel::HexPass,
                    Node3d::MainTransparentPass,
                ),
            );
    }
}
