/// VulkanCommandList - Vulkan implementation of the CommandList trait

use cullgraph_engine::cullgraph::{Error, Result};
use cullgraph_engine::cullgraph::device::{
    BufferBarrier, BufferCopy, CommandList, IndexType, NativeHandle, PipelineBindPoint,
    PipelineStageFlags, Rect2D, Viewport,
};
use cullgraph_engine::engine_error;
use ash::vk;

use crate::vulkan_conv::*;

const SOURCE: &str = "cullgraph::vulkan";

/// Vulkan command list implementation
///
/// Owns one primary command buffer and its pool. Render pass (or dynamic
/// rendering) begin/end and queue submission are done by the caller through
/// `command_buffer()`.
pub struct VulkanCommandList {
    /// Vulkan device
    device: ash::Device,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
}

impl VulkanCommandList {
    /// Create a new command list
    ///
    /// # Arguments
    ///
    /// * `device` - Vulkan logical device
    /// * `queue_family_index` - Queue family the buffer will be submitted to
    pub fn new(device: ash::Device, queue_family_index: u32) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family_index)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create command pool: {:?}", e);
                    Error::BackendError(format!("Failed to create command pool: {:?}", e))
                })?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    engine_error!(SOURCE, "Failed to allocate command buffer: {:?}", e);
                    device.destroy_command_pool(command_pool, None);
                    return Err(Error::BackendError(format!("Failed to allocate command buffers: {:?}", e)));
                }
            };

            Ok(Self {
                device,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn recording(&self) -> Result<vk::CommandBuffer> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(self.command_buffer)
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device
                .end_command_buffer(cb)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn pipeline_barrier(
        &mut self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barriers: &[BufferBarrier],
    ) -> Result<()> {
        let cb = self.recording()?;
        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = barriers
            .iter()
            .map(|b| {
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(b.src_access))
                    .dst_access_mask(access_flags_to_vk(b.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(raw(b.buffer))
                    .offset(b.offset)
                    .size(b.size)
            })
            .collect();

        unsafe {
            self.device.cmd_pipeline_barrier(
                cb,
                pipeline_stage_flags_to_vk(src_stage),
                pipeline_stage_flags_to_vk(dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &[],
            );
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, bind_point: PipelineBindPoint, pipeline: NativeHandle) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device.cmd_bind_pipeline(cb, bind_point_to_vk(bind_point), raw(pipeline));
        }
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: NativeHandle,
        first_set: u32,
        sets: &[NativeHandle],
    ) -> Result<()> {
        let cb = self.recording()?;
        let vk_sets: Vec<vk::DescriptorSet> = sets.iter().map(|&s| raw(s)).collect();
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cb,
                bind_point_to_vk(bind_point),
                raw(layout),
                first_set,
                &vk_sets,
                &[], // dynamic_offsets
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device.cmd_dispatch(cb, x, y, z);
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: NativeHandle, dst: NativeHandle, regions: &[BufferCopy]) -> Result<()> {
        let cb = self.recording()?;
        let vk_regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy {
                src_offset: r.src_offset,
                dst_offset: r.dst_offset,
                size: r.size,
            })
            .collect();
        unsafe {
            self.device.cmd_copy_buffer(cb, raw(src), raw(dst), &vk_regions);
        }
        Ok(())
    }

    fn set_viewport(&mut self, first: u32, viewports: &[Viewport]) -> Result<()> {
        let cb = self.recording()?;
        let vk_viewports: Vec<vk::Viewport> = viewports
            .iter()
            .map(|v| vk::Viewport {
                x: v.x,
                y: v.y,
                width: v.width,
                height: v.height,
                min_depth: v.min_depth,
                max_depth: v.max_depth,
            })
            .collect();
        unsafe {
            self.device.cmd_set_viewport(cb, first, &vk_viewports);
        }
        Ok(())
    }

    fn set_scissor(&mut self, first: u32, scissors: &[Rect2D]) -> Result<()> {
        let cb = self.recording()?;
        let vk_scissors: Vec<vk::Rect2D> = scissors
            .iter()
            .map(|s| vk::Rect2D {
                offset: vk::Offset2D { x: s.x, y: s.y },
                extent: vk::Extent2D { width: s.width, height: s.height },
            })
            .collect();
        unsafe {
            self.device.cmd_set_scissor(cb, first, &vk_scissors);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: NativeHandle, offset: u64) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(cb, binding, &[raw(buffer)], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: NativeHandle, offset: u64, index_type: IndexType) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device.cmd_bind_index_buffer(cb, raw(buffer), offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: NativeHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        let cb = self.recording()?;
        unsafe {
            self.device.cmd_draw_indexed_indirect(cb, raw(buffer), offset, draw_count, stride);
        }
        Ok(())
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
