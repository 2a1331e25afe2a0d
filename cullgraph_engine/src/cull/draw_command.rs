/// Indirect draw records and the GPU tables the filter shader reads

use bytemuck::{Pod, Zeroable};

/// One indexed indirect draw, laid out as the GPU consumes it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl DrawIndexedIndirectCommand {
    /// Byte stride between consecutive records
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Object type as seen by the filter shader: bounding radius + LOD range
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TypeDefinition {
    pub bounding_radius: f32,
    pub lod_first: u32,
    pub lod_count: u32,
    pub std430_pad0: u32,
}

/// Distance band of one LOD and the draw records it selects
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct LodDefinition {
    pub min_distance: f32,
    pub max_distance: f32,
    pub record_first: u32,
    pub record_count: u32,
}

impl LodDefinition {
    /// Whether an object at `distance` uses this LOD (`[min, max)`)
    pub fn contains(&self, distance: f32) -> bool {
        distance >= self.min_distance && distance < self.max_distance
    }
}

/// Index range of one geometry inside the shared vertex/index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryRange {
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}

impl GeometryRange {
    pub fn new(index_count: u32, first_index: u32, vertex_offset: i32) -> Self {
        Self { index_count, first_index, vertex_offset }
    }
}
