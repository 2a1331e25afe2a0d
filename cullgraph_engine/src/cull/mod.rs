//! GPU-culling draw protocol
//!
//! A compute shader filters the instances of each category against the
//! camera, writing visible instance indices and per-record instance counts
//! into buffer A. A is then copied into B, which the indirect draws read.
//! Draw counts never depend on visibility: invisible records simply carry
//! `instance_count = 0`.

pub mod draw_command;
pub mod registry;
pub mod offsets;
pub mod recorder;
pub mod category;

pub use draw_command::{DrawIndexedIndirectCommand, GeometryRange, LodDefinition, TypeDefinition};
pub use registry::DrawRecordRegistry;
pub use offsets::{compute_instance_offsets, InstanceOffsets};
pub use recorder::{CategoryFrame, CullFrameRecorder};
pub use category::{CullCategory, GeometryBuffers, InstanceRecord};

#[cfg(test)]
#[path = "category_tests.rs"]
mod tests;
