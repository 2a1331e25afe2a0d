/// CullFrameRecorder - compute, copy and draw commands of the culling frame

use crate::config::EngineConfig;
use crate::cull::DrawIndexedIndirectCommand;
use crate::device::{
    AccessFlags, BufferBarrier, BufferCopy, CommandList, DeviceFeatures, IndexType, NativeHandle,
    PipelineBindPoint, PipelineStageFlags, Rect2D, Viewport,
};
use crate::engine::Engine;
use crate::engine_trace;
use crate::error::Result;

const SOURCE: &str = "cullgraph::CullFrameRecorder";

/// Native handles of one category for the frame being recorded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryFrame {
    /// Buffer A
    pub results: NativeHandle,
    /// Buffer B
    pub indirect: NativeHandle,
    /// Bytes of draw records in A (and B)
    pub command_bytes: u64,
    pub filter_pipeline: NativeHandle,
    pub filter_layout: NativeHandle,
    pub filter_set: NativeHandle,
    pub render_pipeline: NativeHandle,
    pub render_layout: NativeHandle,
    pub render_set: NativeHandle,
    pub vertex_buffer: NativeHandle,
    pub index_buffer: NativeHandle,
    pub index_type: IndexType,
    /// Instances the filter shader runs over
    pub instance_count: u32,
    /// Registered draw records, independent of visibility
    pub draw_count: u32,
    pub dynamic_viewport: bool,
    pub dynamic_scissor: bool,
}

/// Records the double-buffered indirect draw protocol
///
/// `record_compute` runs before the render pass: host writes to A become
/// visible to the filter shader, the filter shader fills A, A is copied into
/// B, and B is made visible to indirect reads. `record_draw` runs inside the
/// render pass and only ever reads B. Every barrier covers all categories of
/// the frame at once.
#[derive(Debug, Clone, Copy)]
pub struct CullFrameRecorder {
    multi_draw_indirect: bool,
    config: EngineConfig,
}

impl CullFrameRecorder {
    /// Recorder for a device, honouring `EngineConfig::multi_draw_indirect_override`
    pub fn new(features: DeviceFeatures) -> Self {
        let config = Engine::config();
        Self {
            multi_draw_indirect: config
                .multi_draw_indirect_override
                .unwrap_or(features.multi_draw_indirect),
            config,
        }
    }

    pub fn uses_multi_draw_indirect(&self) -> bool {
        self.multi_draw_indirect
    }

    /// Steps before the render pass: barrier, filter dispatch, barrier, copy, barrier
    pub fn record_compute(&self, cmd: &mut dyn CommandList, frames: &[CategoryFrame]) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }

        let host_to_filter: Vec<BufferBarrier> = frames
            .iter()
            .map(|f| BufferBarrier::new(f.results, AccessFlags::HOST_WRITE, AccessFlags::SHADER_READ))
            .collect();
        cmd.pipeline_barrier(PipelineStageFlags::HOST, PipelineStageFlags::COMPUTE_SHADER, &host_to_filter)?;

        for frame in frames {
            cmd.bind_pipeline(PipelineBindPoint::Compute, frame.filter_pipeline)?;
            cmd.bind_descriptor_sets(PipelineBindPoint::Compute, frame.filter_layout, 0, &[frame.filter_set])?;
            let groups = self.config.dispatch_groups(frame.instance_count);
            cmd.dispatch(groups, 1, 1)?;
            engine_trace!(SOURCE, "filter dispatch of {} groups for {} instances", groups, frame.instance_count);
        }

        let filter_to_copy: Vec<BufferBarrier> = frames
            .iter()
            .map(|f| BufferBarrier::new(f.results, AccessFlags::SHADER_WRITE, AccessFlags::TRANSFER_READ))
            .collect();
        cmd.pipeline_barrier(PipelineStageFlags::COMPUTE_SHADER, PipelineStageFlags::TRANSFER, &filter_to_copy)?;

        for frame in frames {
            cmd.copy_buffer(
                frame.results,
                frame.indirect,
                &[BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: frame.command_bytes,
                }],
            )?;
        }

        let copy_to_draw: Vec<BufferBarrier> = frames
            .iter()
            .map(|f| {
                BufferBarrier::new(f.indirect, AccessFlags::TRANSFER_WRITE, AccessFlags::INDIRECT_COMMAND_READ)
            })
            .collect();
        cmd.pipeline_barrier(PipelineStageFlags::TRANSFER, PipelineStageFlags::DRAW_INDIRECT, &copy_to_draw)?;
        Ok(())
    }

    /// Draw step, inside a render pass begun by the caller
    pub fn record_draw(
        &self,
        cmd: &mut dyn CommandList,
        frames: &[CategoryFrame],
        viewport: Viewport,
        scissor: Rect2D,
    ) -> Result<()> {
        let stride = DrawIndexedIndirectCommand::STRIDE;
        for frame in frames {
            cmd.bind_pipeline(PipelineBindPoint::Graphics, frame.render_pipeline)?;
            if frame.dynamic_viewport {
                cmd.set_viewport(0, &[viewport])?;
            }
            if frame.dynamic_scissor {
                cmd.set_scissor(0, &[scissor])?;
            }
            cmd.bind_descriptor_sets(PipelineBindPoint::Graphics, frame.render_layout, 0, &[frame.render_set])?;
            cmd.bind_vertex_buffer(0, frame.vertex_buffer, 0)?;
            cmd.bind_index_buffer(frame.index_buffer, 0, frame.index_type)?;

            if self.multi_draw_indirect {
                cmd.draw_indexed_indirect(frame.indirect, 0, frame.draw_count, stride)?;
            } else {
                for record in 0..frame.draw_count {
                    let offset = u64::from(record) * u64::from(stride);
                    cmd.draw_indexed_indirect(frame.indirect, offset, 1, stride)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
