//! Frame-multiplicity ring and the update → render handoff

pub mod surface_frames;
pub mod command_slots;
pub mod stage_ring;
pub mod update;

pub use surface_frames::SurfaceFrames;
pub use command_slots::CommandBufferSlots;
pub use stage_ring::StageRing;
pub use update::{parallel_update, publish_objects, DynamicInstance, DynamicObject, Kinematic, StaticInstance, MAX_BONES};

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
