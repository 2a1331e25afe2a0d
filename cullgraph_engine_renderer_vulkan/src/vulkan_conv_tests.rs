//! Unit tests for Vulkan conversion functions
//!
//! Pure mappings only, no GPU required.

use ash::vk;
use cullgraph_engine::cullgraph::device::{
    AccessFlags, AttachmentFormat, BlendAttachmentDefinition, BlendFactor, BufferUsage, ColorWriteMask,
    CullMode, DescriptorType, DynamicState, IndexType, NativeHandle, PipelineStageFlags,
    PrimitiveTopology, ShaderStageFlags, VertexFormat,
};
use super::*;

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn test_native_handle_round_trips_raw_value() {
    let buffer = vk::Buffer::from_raw(0xdead_beef);
    assert_eq!(native(buffer), NativeHandle(0xdead_beef));
    assert_eq!(raw::<vk::Buffer>(NativeHandle(0xdead_beef)), buffer);
}

#[test]
fn test_null_handle_maps_to_null_object() {
    assert_eq!(raw::<vk::PipelineCache>(NativeHandle::NULL), vk::PipelineCache::null());
}

// ============================================================================
// DESCRIPTORS AND FLAGS
// ============================================================================

#[test]
fn test_descriptor_types() {
    assert_eq!(descriptor_type_to_vk(DescriptorType::StorageBuffer), vk::DescriptorType::STORAGE_BUFFER);
    assert_eq!(descriptor_type_to_vk(DescriptorType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::StorageBufferDynamic),
        vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
    );
}

#[test]
fn test_shader_stage_flags_combine() {
    assert_eq!(
        stage_flags_to_vk(ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::COMPUTE), vk::ShaderStageFlags::COMPUTE);
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::ALL_GRAPHICS), vk::ShaderStageFlags::ALL_GRAPHICS);
}

#[test]
fn test_culling_barrier_flags() {
    assert_eq!(
        access_flags_to_vk(AccessFlags::TRANSFER_WRITE),
        vk::AccessFlags::TRANSFER_WRITE
    );
    assert_eq!(
        access_flags_to_vk(AccessFlags::INDIRECT_COMMAND_READ | AccessFlags::SHADER_READ),
        vk::AccessFlags::INDIRECT_COMMAND_READ | vk::AccessFlags::SHADER_READ
    );
    assert_eq!(
        pipeline_stage_flags_to_vk(PipelineStageFlags::DRAW_INDIRECT),
        vk::PipelineStageFlags::DRAW_INDIRECT
    );
    assert_eq!(
        pipeline_stage_flags_to_vk(PipelineStageFlags::HOST | PipelineStageFlags::COMPUTE_SHADER),
        vk::PipelineStageFlags::HOST | vk::PipelineStageFlags::COMPUTE_SHADER
    );
}

#[test]
fn test_indirect_buffer_usage() {
    assert_eq!(
        buffer_usage_to_vk(BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::TRANSFER_DST),
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::INDIRECT_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
    );
    assert_eq!(buffer_usage_to_vk(BufferUsage::empty()), vk::BufferUsageFlags::empty());
}

#[test]
fn test_index_type() {
    assert_eq!(index_type_to_vk(IndexType::U32), vk::IndexType::UINT32);
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
}

// ============================================================================
// PIPELINE STATE
// ============================================================================

#[test]
fn test_vertex_formats() {
    assert_eq!(vertex_format_to_vk(VertexFormat::Vec3), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(vertex_format_to_vk(VertexFormat::UVec4), vk::Format::R32G32B32A32_UINT);
}

#[test]
fn test_topology_and_cull_mode() {
    assert_eq!(topology_to_vk(PrimitiveTopology::PatchList), vk::PrimitiveTopology::PATCH_LIST);
    assert_eq!(topology_to_vk(PrimitiveTopology::TriangleFan), vk::PrimitiveTopology::TRIANGLE_FAN);
    assert_eq!(cull_mode_to_vk(CullMode::FrontAndBack), vk::CullModeFlags::FRONT_AND_BACK);
}

#[test]
fn test_disabled_blend_only_sets_write_mask() {
    let attachment = BlendAttachmentDefinition {
        color_write_mask: ColorWriteMask::R | ColorWriteMask::A,
        ..BlendAttachmentDefinition::default()
    };
    let state = blend_attachment_to_vk(&attachment);
    assert_eq!(state.blend_enable, vk::FALSE);
    assert_eq!(state.color_write_mask, vk::ColorComponentFlags::R | vk::ColorComponentFlags::A);
    assert_eq!(state.src_color_blend_factor, vk::BlendFactor::ZERO);
}

#[test]
fn test_enabled_blend_carries_factors() {
    let attachment = BlendAttachmentDefinition {
        blend_enable: true,
        src_color_factor: BlendFactor::One,
        ..BlendAttachmentDefinition::default()
    };
    let state = blend_attachment_to_vk(&attachment);
    assert_eq!(state.blend_enable, vk::TRUE);
    assert_eq!(state.src_color_blend_factor, vk::BlendFactor::ONE);
    assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
}

#[test]
fn test_dynamic_states() {
    assert_eq!(dynamic_state_to_vk(DynamicState::Viewport), vk::DynamicState::VIEWPORT);
    assert_eq!(dynamic_state_to_vk(DynamicState::Scissor), vk::DynamicState::SCISSOR);
    assert_eq!(dynamic_state_to_vk(DynamicState::StencilReference), vk::DynamicState::STENCIL_REFERENCE);
}

#[test]
fn test_attachment_formats() {
    assert_eq!(attachment_format_to_vk(AttachmentFormat::B8G8R8A8Srgb), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(attachment_format_to_vk(AttachmentFormat::D32Sfloat), vk::Format::D32_SFLOAT);
    assert!(has_stencil(AttachmentFormat::D24UnormS8Uint));
    assert!(!has_stencil(AttachmentFormat::D32Sfloat));
}
