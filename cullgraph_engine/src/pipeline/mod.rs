//! Pipeline objects
//!
//! Layouts, caches, shader modules and the two pipeline kinds. All of them
//! are device-scoped: one native object per device, rebuilt on the next
//! `validate(ctx)` after an input changed.

pub mod pipeline_layout;
pub mod pipeline_cache;
pub mod shader_module;
pub mod graphics_pipeline;
pub mod compute_pipeline;

pub use pipeline_layout::PipelineLayout;
pub use pipeline_cache::PipelineCache;
pub use shader_module::{ShaderModule, ShaderStageDefinition};
pub use graphics_pipeline::GraphicsPipeline;
pub use compute_pipeline::ComputePipeline;

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
