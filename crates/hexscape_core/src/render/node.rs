//! Prism render graph node.
//!
//! Draws every queued [`QueuedHexDraw`](super::prepare::QueuedHexDraw) into
//! the view target on top of the main opaque pass, sharing its depth buffer.
//! One instanced indexed draw per queued entry.

use bevy::prelude::*;
use bevy::render::{
    camera::ExtractedCamera,
    render_graph::{NodeRunError, RenderGraphContext, ViewNode},
    render_resource::{
        IndexFormat, LoadOp, Operations, PipelineCache, RenderPassDepthStencilAttachment,
        RenderPassDescriptor, StoreOp,
    },
    renderer::RenderContext,
    view::{ViewDepthTexture, ViewTarget},
};

use super::pipeline::HexPipeline;
use super::prepare::{HexDrawQueue, HexViewBindGroup};

#[derive(Default)]
pub struct HexPassNode;

impl ViewNode for HexPassNode {
    type ViewQuery = (
        &'static ExtractedCamera,
        &'static ViewTarget,
        &'static ViewDepthTexture,
        &'static HexViewBindGroup,
    );

    fn run<'w>(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext<'w>,
        (camera, target, depth, view_bind_group): bevy::ecs::query::QueryItem<
            'w,
            '_,
            Self::ViewQuery,
        >,
        world: &'w World,
    ) -> Result<(), NodeRunError> {
        let Some(queue) = world.get_resource::<HexDrawQueue>() else {
            return Ok(());
        };
        if queue.draws.is_empty() {
            return Ok(());
        }

        let Some(hex_pipeline) = world.get_resource::<HexPipeline>() else {
            return Ok(());
        };
        let pipeline_cache = world.resource::<PipelineCache>();
        let Some(pipeline) = pipeline_cache.get_render_pipeline(hex_pipeline.pipeline_id) else {
            // Shader still loading
            return Ok(());
        };

        let mut render_pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("hex_prism_pass"),
            color_attachments: &[Some(target.get_color_attachment())],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth.view(),
                depth_ops: Some(Operations {
                    load: LoadOp::Load,
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(viewport) = &camera.viewport {
            render_pass.set_camera_viewport(viewport);
        }

        render_pass.set_render_pipeline(pipeline);
        render_pass.set_bind_group(0, &view_bind_group.bind_group, &[]);

        for draw in &queue.draws {
            render_pass.set_bind_group(1, &draw.bind_group, &[]);
            render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, draw.instance_buffer.slice(..));
            render_pass.set_index_buffer(draw.index_buffer.slice(..), 0, IndexFormat::Uint32);
            render_pass.draw_indexed(0..draw.index_count, 0, 0..draw.instance_count);
        }

        Ok(())
    }
}
