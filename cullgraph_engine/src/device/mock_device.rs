/// Mock GraphicsDevice and CommandList for unit tests (no GPU required)
///
/// The mock hands out unique handles, counts creations and destructions per
/// object kind, enforces descriptor pool capacity and records every command
/// so tests can check ordering.

#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use rustc_hash::FxHashMap;

#[cfg(test)]
use crate::context::DeviceId;
#[cfg(test)]
use crate::descriptor::DescriptorSetLayoutBinding;
#[cfg(test)]
use crate::device::{
    AccessFlags, BufferBarrier, BufferCopy, BufferUsage, CommandList, ComputePipelineDesc,
    DescriptorPoolDesc, DescriptorWrite, DeviceBuffer, DeviceFeatures, GraphicsDevice,
    GraphicsPipelineDesc, IndexType, NativeHandle, PipelineBindPoint, PipelineStageFlags,
    PushConstantRange, Rect2D, ShaderStageFlags, Viewport,
};
#[cfg(test)]
use crate::error::{Error, Result};
#[cfg(test)]
use crate::engine_bail;

// ============================================================================
// Object kinds
// ============================================================================


// ============================================================================
// Shared mock state
// ============================================================================

#[cfg(test)]
#[derive(Debug, Default)]
struct MockPool {
    max_sets: u32,
    allocated: Vec<NativeHandle>,
}

/// Captured graphics pipeline creation, for assertions on flattened state
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct CreatedGraphicsPipeline {
    pub handle: NativeHandle,
    pub layout: NativeHandle,
    pub cache: NativeHandle,
    pub stages: Vec<(ShaderStageFlags, NativeHandle, String)>,
    pub vertex_strides: Vec<u32>,
    pub attribute_locations: Vec<(u32, u32, u32)>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MockDeviceState {
    created: FxHashMap<&'static str, u32>,
    destroyed: FxHashMap<&'static str, u32>,
    live: FxHashMap<NativeHandle, &'static str>,
    pools: FxHashMap<NativeHandle, MockPool>,
    set_writes: FxHashMap<NativeHandle, Vec<DescriptorWrite>>,
    buffer_data: FxHashMap<NativeHandle, Arc<Mutex<Vec<u8>>>>,
    graphics_pipelines: Vec<CreatedGraphicsPipeline>,
    fail_next: Option<Error>,
}

#[cfg(test)]
impl MockDeviceState {
    fn record_create(&mut self, kind: &'static str, handle: NativeHandle) {
        *self.created.entry(kind).or_insert(0) += 1;
        self.live.insert(handle, kind);
    }

    fn record_destroy(&mut self, handle: NativeHandle) {
        if let Some(kind) = self.live.remove(&handle) {
            *self.destroyed.entry(kind).or_insert(0) += 1;
        }
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[cfg(test)]
pub struct MockBuffer {
    handle: NativeHandle,
    size: u64,
    data: Arc<Mutex<Vec<u8>>>,
    state: Arc<Mutex<MockDeviceState>>,
}

#[cfg(test)]
impl DeviceBuffer for MockBuffer {
    fn handle(&self) -> NativeHandle {
        self.handle
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            engine_bail!("cullgraph::mock", "write of {} bytes at {} overflows buffer of {}",
                data.len(), offset, self.size);
        }
        let mut bytes = self.data.lock().unwrap();
        bytes[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
impl Drop for MockBuffer {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.buffer_data.remove(&self.handle);
        state.record_destroy(self.handle);
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

#[cfg(test)]
pub struct MockGraphicsDevice {
    id: DeviceId,
    features: DeviceFeatures,
    next_handle: AtomicU64,
    state: Arc<Mutex<MockDeviceState>>,
}

#[cfg(test)]
impl MockGraphicsDevice {
    pub fn new(id: u64) -> Self {
        Self::with_features(id, DeviceFeatures { multi_draw_indirect: true })
    }

    pub fn with_features(id: u64, features: DeviceFeatures) -> Self {
        Self {
            id: DeviceId(id),
            features,
            // Offset per device so handles never collide across mock devices
            next_handle: AtomicU64::new(id * 1_000_000 + 1),
            state: Arc::new(Mutex::new(MockDeviceState::default())),
        }
    }

    /// Number of objects of `kind` created so far
    pub fn created(&self, kind: &str) -> u32 {
        self.state.lock().unwrap().created.get(kind).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` destroyed so far
    pub fn destroyed(&self, kind: &str) -> u32 {
        self.state.lock().unwrap().destroyed.get(kind).copied().unwrap_or(0)
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.state.lock().unwrap().live.contains_key(&handle)
    }

    /// Descriptor writes last applied to `set`
    pub fn writes(&self, set: NativeHandle) -> Vec<DescriptorWrite> {
        self.state.lock().unwrap().set_writes.get(&set).cloned().unwrap_or_default()
    }

    /// Current bytes of a live buffer
    pub fn buffer_contents(&self, buffer: NativeHandle) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.buffer_data.get(&buffer).map(|data| data.lock().unwrap().clone())
    }

    pub fn graphics_pipelines(&self) -> Vec<CreatedGraphicsPipeline> {
        self.state.lock().unwrap().graphics_pipelines.clone()
    }

    /// Make the next create/allocate call fail with `error`
    pub fn fail_next(&self, error: Error) {
        self.state.lock().unwrap().fail_next = Some(error);
    }

    fn next(&self) -> NativeHandle {
        NativeHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn create(&self, kind: &'static str) -> Result<NativeHandle> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        let handle = self.next();
        state.record_create(kind, handle);
        Ok(handle)
    }

    fn destroy(&self, handle: NativeHandle) {
        self.state.lock().unwrap().record_destroy(handle);
    }
}

#[cfg(test)]
impl GraphicsDevice for MockGraphicsDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn features(&self) -> DeviceFeatures {
        self.features
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorSetLayoutBinding],
    ) -> Result<NativeHandle> {
        if bindings.is_empty() {
            engine_bail!("cullgraph::mock", "layout without bindings");
        }
        self.create(kind::SET_LAYOUT)
    }

    fn destroy_descriptor_set_layout(&self, layout: NativeHandle) {
        self.destroy(layout);
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<NativeHandle> {
        let handle = self.create(kind::POOL)?;
        self.state.lock().unwrap().pools.insert(handle, MockPool {
            max_sets: desc.max_sets,
            allocated: Vec::new(),
        });
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: NativeHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(removed) = state.pools.remove(&pool) {
            for set in removed.allocated {
                state.record_destroy(set);
            }
        }
        state.record_destroy(pool);
    }

    fn allocate_descriptor_set(
        &self,
        pool: NativeHandle,
        layout: NativeHandle,
    ) -> Result<NativeHandle> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        if !state.live.contains_key(&layout) {
            engine_bail!("cullgraph::mock", "unknown layout {:?}", layout);
        }
        let handle = self.next();
        let entry = match state.pools.get_mut(&pool) {
            Some(entry) => entry,
            None => engine_bail!("cullgraph::mock", "unknown pool {:?}", pool),
        };
        if entry.allocated.len() as u32 >= entry.max_sets {
            return Err(Error::PoolExhausted { capacity: entry.max_sets });
        }
        entry.allocated.push(handle);
        state.record_create(kind::DESCRIPTOR_SET, handle);
        Ok(handle)
    }

    fn free_descriptor_set(&self, pool: NativeHandle, set: NativeHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.pools.get_mut(&pool) {
            entry.allocated.retain(|h| *h != set);
        }
        state.set_writes.remove(&set);
        state.record_destroy(set);
        Ok(())
    }

    fn update_descriptor_set(&self, set: NativeHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.live.contains_key(&set) {
            engine_bail!("cullgraph::mock", "write into unknown descriptor set {:?}", set);
        }
        state.set_writes.insert(set, writes.to_vec());
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[NativeHandle],
        _push_constants: &[PushConstantRange],
    ) -> Result<NativeHandle> {
        self.create(kind::PIPELINE_LAYOUT)
    }

    fn destroy_pipeline_layout(&self, layout: NativeHandle) {
        self.destroy(layout);
    }

    fn create_pipeline_cache(&self, _initial_data: &[u8]) -> Result<NativeHandle> {
        self.create(kind::PIPELINE_CACHE)
    }

    fn destroy_pipeline_cache(&self, cache: NativeHandle) {
        self.destroy(cache);
    }

    fn create_shader_module(&self, code: &[u8]) -> Result<NativeHandle> {
        if code.len() % 4 != 0 {
            return Err(Error::InvalidResource("SPIR-V length not a multiple of 4".to_string()));
        }
        self.create(kind::SHADER)
    }

    fn destroy_shader_module(&self, module: NativeHandle) {
        self.destroy(module);
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<NativeHandle> {
        let handle = self.create(kind::GRAPHICS_PIPELINE)?;
        self.state.lock().unwrap().graphics_pipelines.push(CreatedGraphicsPipeline {
            handle,
            layout: desc.layout,
            cache: desc.cache,
            stages: desc
                .stages
                .iter()
                .map(|s| (s.stage, s.module, s.entry_point.to_string()))
                .collect(),
            vertex_strides: desc.vertex_bindings.iter().map(|b| b.stride).collect(),
            attribute_locations: desc
                .vertex_attributes
                .iter()
                .map(|a| (a.location, a.binding, a.offset))
                .collect(),
        });
        Ok(handle)
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<NativeHandle> {
        if desc.stage.stage != ShaderStageFlags::COMPUTE {
            engine_bail!("cullgraph::mock", "compute pipeline with {:?} stage", desc.stage.stage);
        }
        self.create(kind::COMPUTE_PIPELINE)
    }

    fn destroy_pipeline(&self, pipeline: NativeHandle) {
        self.destroy(pipeline);
    }

    fn create_buffer(&self, size: u64, _usage: BufferUsage) -> Result<Arc<dyn DeviceBuffer>> {
        let handle = self.create(kind::BUFFER)?;
        let data = Arc::new(Mutex::new(vec![0u8; size as usize]));
        self.state.lock().unwrap().buffer_data.insert(handle, data.clone());
        Ok(Arc::new(MockBuffer {
            handle,
            size,
            data,
            state: self.state.clone(),
        }))
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

/// One recorded command
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Barrier {
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barriers: Vec<BufferBarrier>,
    },
    BindPipeline(PipelineBindPoint, NativeHandle),
    BindDescriptorSets {
        bind_point: PipelineBindPoint,
        layout: NativeHandle,
        first_set: u32,
        sets: Vec<NativeHandle>,
    },
    Dispatch(u32, u32, u32),
    CopyBuffer {
        src: NativeHandle,
        dst: NativeHandle,
        regions: Vec<BufferCopy>,
    },
    SetViewport(Vec<Viewport>),
    SetScissor(Vec<Rect2D>),
    BindVertexBuffer(u32, NativeHandle, u64),
    BindIndexBuffer(NativeHandle, u64, IndexType),
    DrawIndexedIndirect {
        buffer: NativeHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
}

#[cfg(test)]
impl RecordedCommand {
    /// True for a barrier whose first buffer barrier goes `src` -> `dst`
    pub fn is_barrier(&self, src: AccessFlags, dst: AccessFlags) -> bool {
        match self {
            RecordedCommand::Barrier { barriers, .. } => barriers
                .first()
                .map(|b| b.src_access == src && b.dst_access == dst)
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCommandList {
    pub commands: Vec<RecordedCommand>,
    pub is_recording: bool,
}

#[cfg(test)]
impl MockCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, command: RecordedCommand) -> Result<()> {
        if !self.is_recording {
            engine_bail!("cullgraph::mock", "command recorded outside begin/end: {:?}", command);
        }
        self.commands.push(command);
        Ok(())
    }
}

#[cfg(test)]
impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.is_recording = true;
        self.commands.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.is_recording = false;
        Ok(())
    }

    fn pipeline_barrier(
        &mut self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barriers: &[BufferBarrier],
    ) -> Result<()> {
        self.push(RecordedCommand::Barrier {
            src_stage,
            dst_stage,
            barriers: barriers.to_vec(),
        })
    }

    fn bind_pipeline(&mut self, bind_point: PipelineBindPoint, pipeline: NativeHandle) -> Result<()> {
        self.push(RecordedCommand::BindPipeline(bind_point, pipeline))
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: NativeHandle,
        first_set: u32,
        sets: &[NativeHandle],
    ) -> Result<()> {
        self.push(RecordedCommand::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
        })
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.push(RecordedCommand::Dispatch(x, y, z))
    }

    fn copy_buffer(
        &mut self,
        src: NativeHandle,
        dst: NativeHandle,
        regions: &[BufferCopy],
    ) -> Result<()> {
        self.push(RecordedCommand::CopyBuffer {
            src,
            dst,
            regions: regions.to_vec(),
        })
    }

    fn set_viewport(&mut self, _first: u32, viewports: &[Viewport]) -> Result<()> {
        self.push(RecordedCommand::SetViewport(viewports.to_vec()))
    }

    fn set_scissor(&mut self, _first: u32, scissors: &[Rect2D]) -> Result<()> {
        self.push(RecordedCommand::SetScissor(scissors.to_vec()))
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: NativeHandle, offset: u64) -> Result<()> {
        self.push(RecordedCommand::BindVertexBuffer(binding, buffer, offset))
    }

    fn bind_index_buffer(
        &mut self,
        buffer: NativeHandle,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.push(RecordedCommand::BindIndexBuffer(buffer, offset, index_type))
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: NativeHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.push(RecordedCommand::DrawIndexedIndirect {
            buffer,
            offset,
            draw_count,
            stride,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
