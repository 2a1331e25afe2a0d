/// GraphicsDevice trait - backend boundary for native object creation
///
/// The device itself is provisioned outside this crate (instance, physical
/// device selection, queues). Validation caches only ever call the
/// create/destroy pairs below, and always destroy a handle with the device
/// that created it.

use std::sync::Arc;
use crate::context::DeviceId;
use crate::device::{
    BufferUsage, ComputePipelineDesc, DescriptorPoolDesc, DescriptorWrite,
    GraphicsPipelineDesc, NativeHandle, PushConstantRange,
};
use crate::descriptor::DescriptorSetLayoutBinding;
use crate::error::Result;

/// Optional device capabilities the culling protocol depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceFeatures {
    pub multi_draw_indirect: bool,
}

/// GPU buffer created by a device
///
/// Host-visible: `write` copies straight into mapped memory. Dropping the
/// last reference frees the native buffer.
pub trait DeviceBuffer: Send + Sync {
    fn handle(&self) -> NativeHandle;

    fn size(&self) -> u64;

    /// Copy `data` into the buffer at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;
}

/// Factory for native GPU objects on one logical device
pub trait GraphicsDevice: Send + Sync {
    /// Stable identifier used as the device context key
    fn id(&self) -> DeviceId;

    fn features(&self) -> DeviceFeatures;

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorSetLayoutBinding],
    ) -> Result<NativeHandle>;

    fn destroy_descriptor_set_layout(&self, layout: NativeHandle);

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<NativeHandle>;

    fn destroy_descriptor_pool(&self, pool: NativeHandle);

    /// Allocate one set; `Error::PoolExhausted` when the pool is full
    fn allocate_descriptor_set(
        &self,
        pool: NativeHandle,
        layout: NativeHandle,
    ) -> Result<NativeHandle>;

    fn free_descriptor_set(&self, pool: NativeHandle, set: NativeHandle) -> Result<()>;

    fn update_descriptor_set(&self, set: NativeHandle, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== PIPELINES =====

    fn create_pipeline_layout(
        &self,
        set_layouts: &[NativeHandle],
        push_constants: &[PushConstantRange],
    ) -> Result<NativeHandle>;

    fn destroy_pipeline_layout(&self, layout: NativeHandle);

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<NativeHandle>;

    fn destroy_pipeline_cache(&self, cache: NativeHandle);

    /// Create a shader module from SPIR-V bytes
    fn create_shader_module(&self, code: &[u8]) -> Result<NativeHandle>;

    fn destroy_shader_module(&self, module: NativeHandle);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<NativeHandle>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<NativeHandle>;

    fn destroy_pipeline(&self, pipeline: NativeHandle);

    // ===== BUFFERS =====

    fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<Arc<dyn DeviceBuffer>>;
}
