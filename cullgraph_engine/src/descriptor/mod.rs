//! Descriptor graph
//!
//! Resources know which descriptors reference them, descriptors know their
//! owning set, and sets know the nodes that bind them. A change anywhere
//! below a set walks that chain upwards and marks everything on the way for
//! rebuild; nothing is rebuilt until the next `validate(ctx)`.

pub mod layout;
pub mod resource;
pub mod descriptor;
pub mod descriptor_set;
pub mod buffer;
pub mod image;

pub use layout::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBinding};
pub use resource::{DescriptorObservers, ObserverId, Resource};
pub use descriptor::Descriptor;
pub use descriptor_set::DescriptorSet;
pub use buffer::GpuBuffer;
pub use image::SampledImage;

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
