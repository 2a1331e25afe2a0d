/// Buffer - Vulkan implementation of the DeviceBuffer trait

use cullgraph_engine::cullgraph::{Error, Result};
use cullgraph_engine::cullgraph::device::{DeviceBuffer, NativeHandle};
use cullgraph_engine::{engine_bail, engine_trace};
use ash::vk::{self, Handle};
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Host-visible Vulkan buffer
pub struct Buffer {
    /// Shared GPU context (device, allocator)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation (CpuToGpu, persistently mapped)
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size
    pub(crate) size: u64,
}

impl Buffer {
    pub fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
        }
    }
}

impl DeviceBuffer for Buffer {
    fn handle(&self) -> NativeHandle {
        NativeHandle(self.buffer.as_raw())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail!("cullgraph::vulkan",
                "write of {} bytes at {} past the end of a {} byte buffer", data.len(), offset, self.size);
        }

        let Some(allocation) = &self.allocation else {
            engine_bail!("cullgraph::vulkan", "Buffer update failed: no GPU allocation");
        };
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        // SAFETY: the range was checked against the allocation size above
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped_ptr.add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        engine_trace!("cullgraph::vulkan", "destroying buffer {:?} ({} bytes)", self.buffer, self.size);
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
