/// CommandList trait - the subset of command recording the culling frame needs

use crate::device::{
    AccessFlags, IndexType, NativeHandle, PipelineBindPoint, PipelineStageFlags,
    Rect2D, Viewport,
};
use crate::error::Result;

/// Whole-size marker for barrier ranges
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Memory barrier on one buffer range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: NativeHandle,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub offset: u64,
    pub size: u64,
}

impl BufferBarrier {
    pub fn new(buffer: NativeHandle, src_access: AccessFlags, dst_access: AccessFlags) -> Self {
        Self {
            buffer,
            src_access,
            dst_access,
            offset: 0,
            size: WHOLE_SIZE,
        }
    }

    pub fn range(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }
}

/// Region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Command list for recording GPU commands
///
/// Render pass begin/end and submission belong to the surface machinery
/// that owns the command buffer; recording here happens in between.
pub trait CommandList: Send + Sync {
    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    fn pipeline_barrier(
        &mut self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barriers: &[BufferBarrier],
    ) -> Result<()>;

    fn bind_pipeline(&mut self, bind_point: PipelineBindPoint, pipeline: NativeHandle) -> Result<()>;

    fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: NativeHandle,
        first_set: u32,
        sets: &[NativeHandle],
    ) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    fn copy_buffer(
        &mut self,
        src: NativeHandle,
        dst: NativeHandle,
        regions: &[BufferCopy],
    ) -> Result<()>;

    fn set_viewport(&mut self, first: u32, viewports: &[Viewport]) -> Result<()>;

    fn set_scissor(&mut self, first: u32, scissors: &[Rect2D]) -> Result<()>;

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: NativeHandle, offset: u64) -> Result<()>;

    fn bind_index_buffer(
        &mut self,
        buffer: NativeHandle,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()>;

    /// Indexed indirect draw reading `draw_count` records of `stride` bytes
    fn draw_indexed_indirect(
        &mut self,
        buffer: NativeHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()>;
}
