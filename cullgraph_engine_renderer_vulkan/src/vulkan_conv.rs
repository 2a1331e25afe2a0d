/// Conversions from engine types to Vulkan enums and flags

use ash::vk::{self, Handle};
use cullgraph_engine::cullgraph::device::{
    AccessFlags, AttachmentFormat, BlendAttachmentDefinition, BlendFactor, BlendOp, BufferUsage,
    ColorWriteMask, CompareOp, CullMode, DescriptorType, DynamicState, FrontFace, ImageLayout,
    IndexType, NativeHandle, PipelineBindPoint, PipelineStageFlags, PolygonMode, PrimitiveTopology,
    SampleCount, ShaderStageFlags, StencilOp, StencilOpState, VertexFormat, VertexInputRate,
};

/// Native handle of any Vulkan object
pub fn native<H: Handle>(handle: H) -> NativeHandle {
    NativeHandle(handle.as_raw())
}

/// Vulkan object behind a native handle
pub fn raw<H: Handle>(handle: NativeHandle) -> H {
    H::from_raw(handle.0)
}

// ===== DESCRIPTORS =====

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    }
}

// ===== FLAGS =====

pub fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut vk_flags = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) { vk_flags |= vk::ShaderStageFlags::VERTEX; }
    if flags.contains(ShaderStageFlags::TESSELLATION_CONTROL) { vk_flags |= vk::ShaderStageFlags::TESSELLATION_CONTROL; }
    if flags.contains(ShaderStageFlags::TESSELLATION_EVALUATION) { vk_flags |= vk::ShaderStageFlags::TESSELLATION_EVALUATION; }
    if flags.contains(ShaderStageFlags::GEOMETRY) { vk_flags |= vk::ShaderStageFlags::GEOMETRY; }
    if flags.contains(ShaderStageFlags::FRAGMENT) { vk_flags |= vk::ShaderStageFlags::FRAGMENT; }
    if flags.contains(ShaderStageFlags::COMPUTE) { vk_flags |= vk::ShaderStageFlags::COMPUTE; }
    vk_flags
}

pub fn access_flags_to_vk(flags: AccessFlags) -> vk::AccessFlags {
    let mut vk_flags = vk::AccessFlags::empty();
    if flags.contains(AccessFlags::INDIRECT_COMMAND_READ) { vk_flags |= vk::AccessFlags::INDIRECT_COMMAND_READ; }
    if flags.contains(AccessFlags::UNIFORM_READ) { vk_flags |= vk::AccessFlags::UNIFORM_READ; }
    if flags.contains(AccessFlags::SHADER_READ) { vk_flags |= vk::AccessFlags::SHADER_READ; }
    if flags.contains(AccessFlags::SHADER_WRITE) { vk_flags |= vk::AccessFlags::SHADER_WRITE; }
    if flags.contains(AccessFlags::TRANSFER_READ) { vk_flags |= vk::AccessFlags::TRANSFER_READ; }
    if flags.contains(AccessFlags::TRANSFER_WRITE) { vk_flags |= vk::AccessFlags::TRANSFER_WRITE; }
    if flags.contains(AccessFlags::HOST_READ) { vk_flags |= vk::AccessFlags::HOST_READ; }
    if flags.contains(AccessFlags::HOST_WRITE) { vk_flags |= vk::AccessFlags::HOST_WRITE; }
    vk_flags
}

pub fn pipeline_stage_flags_to_vk(flags: PipelineStageFlags) -> vk::PipelineStageFlags {
    let mut vk_flags = vk::PipelineStageFlags::empty();
    if flags.contains(PipelineStageFlags::TOP_OF_PIPE) { vk_flags |= vk::PipelineStageFlags::TOP_OF_PIPE; }
    if flags.contains(PipelineStageFlags::DRAW_INDIRECT) { vk_flags |= vk::PipelineStageFlags::DRAW_INDIRECT; }
    if flags.contains(PipelineStageFlags::VERTEX_SHADER) { vk_flags |= vk::PipelineStageFlags::VERTEX_SHADER; }
    if flags.contains(PipelineStageFlags::FRAGMENT_SHADER) { vk_flags |= vk::PipelineStageFlags::FRAGMENT_SHADER; }
    if flags.contains(PipelineStageFlags::COMPUTE_SHADER) { vk_flags |= vk::PipelineStageFlags::COMPUTE_SHADER; }
    if flags.contains(PipelineStageFlags::TRANSFER) { vk_flags |= vk::PipelineStageFlags::TRANSFER; }
    if flags.contains(PipelineStageFlags::BOTTOM_OF_PIPE) { vk_flags |= vk::PipelineStageFlags::BOTTOM_OF_PIPE; }
    if flags.contains(PipelineStageFlags::HOST) { vk_flags |= vk::PipelineStageFlags::HOST; }
    vk_flags
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut vk_flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) { vk_flags |= vk::BufferUsageFlags::TRANSFER_SRC; }
    if usage.contains(BufferUsage::TRANSFER_DST) { vk_flags |= vk::BufferUsageFlags::TRANSFER_DST; }
    if usage.contains(BufferUsage::UNIFORM) { vk_flags |= vk::BufferUsageFlags::UNIFORM_BUFFER; }
    if usage.contains(BufferUsage::STORAGE) { vk_flags |= vk::BufferUsageFlags::STORAGE_BUFFER; }
    if usage.contains(BufferUsage::INDEX) { vk_flags |= vk::BufferUsageFlags::INDEX_BUFFER; }
    if usage.contains(BufferUsage::VERTEX) { vk_flags |= vk::BufferUsageFlags::VERTEX_BUFFER; }
    if usage.contains(BufferUsage::INDIRECT) { vk_flags |= vk::BufferUsageFlags::INDIRECT_BUFFER; }
    vk_flags
}

pub fn bind_point_to_vk(bind_point: PipelineBindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ===== VERTEX INPUT =====

pub fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float => vk::Format::R32_SFLOAT,
        VertexFormat::Vec2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Vec3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Vec4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::UInt => vk::Format::R32_UINT,
        VertexFormat::UVec4 => vk::Format::R32G32B32A32_UINT,
    }
}

pub fn input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

// ===== Pipeline state conversions =====

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
        PrimitiveTopology::PatchList => vk::PrimitiveTopology::PATCH_LIST,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn stencil_op_to_vk(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub fn stencil_op_state_to_vk(state: &StencilOpState) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: stencil_op_to_vk(state.fail_op),
        pass_op: stencil_op_to_vk(state.pass_op),
        depth_fail_op: stencil_op_to_vk(state.depth_fail_op),
        compare_op: compare_op_to_vk(state.compare_op),
        compare_mask: state.compare_mask,
        write_mask: state.write_mask,
        reference: state.reference,
    }
}

pub fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

pub fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn color_write_mask_to_vk(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::R) { flags |= vk::ColorComponentFlags::R; }
    if mask.contains(ColorWriteMask::G) { flags |= vk::ColorComponentFlags::G; }
    if mask.contains(ColorWriteMask::B) { flags |= vk::ColorComponentFlags::B; }
    if mask.contains(ColorWriteMask::A) { flags |= vk::ColorComponentFlags::A; }
    flags
}

pub fn blend_attachment_to_vk(attachment: &BlendAttachmentDefinition) -> vk::PipelineColorBlendAttachmentState {
    let state = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(color_write_mask_to_vk(attachment.color_write_mask))
        .blend_enable(attachment.blend_enable);
    if !attachment.blend_enable {
        return state;
    }
    state
        .src_color_blend_factor(blend_factor_to_vk(attachment.src_color_factor))
        .dst_color_blend_factor(blend_factor_to_vk(attachment.dst_color_factor))
        .color_blend_op(blend_op_to_vk(attachment.color_blend_op))
        .src_alpha_blend_factor(blend_factor_to_vk(attachment.src_alpha_factor))
        .dst_alpha_blend_factor(blend_factor_to_vk(attachment.dst_alpha_factor))
        .alpha_blend_op(blend_op_to_vk(attachment.alpha_blend_op))
}

pub fn sample_count_to_vk(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
    }
}

pub fn dynamic_state_to_vk(state: DynamicState) -> vk::DynamicState {
    match state {
        DynamicState::Viewport => vk::DynamicState::VIEWPORT,
        DynamicState::Scissor => vk::DynamicState::SCISSOR,
        DynamicState::LineWidth => vk::DynamicState::LINE_WIDTH,
        DynamicState::DepthBias => vk::DynamicState::DEPTH_BIAS,
        DynamicState::BlendConstants => vk::DynamicState::BLEND_CONSTANTS,
        DynamicState::DepthBounds => vk::DynamicState::DEPTH_BOUNDS,
        DynamicState::StencilCompareMask => vk::DynamicState::STENCIL_COMPARE_MASK,
        DynamicState::StencilWriteMask => vk::DynamicState::STENCIL_WRITE_MASK,
        DynamicState::StencilReference => vk::DynamicState::STENCIL_REFERENCE,
    }
}

pub fn attachment_format_to_vk(format: AttachmentFormat) -> vk::Format {
    match format {
        AttachmentFormat::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        AttachmentFormat::B8G8R8A8Srgb => vk::Format::B8G8R8A8_SRGB,
        AttachmentFormat::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        AttachmentFormat::R16G16B16A16Sfloat => vk::Format::R16G16B16A16_SFLOAT,
        AttachmentFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        AttachmentFormat::D32Sfloat => vk::Format::D32_SFLOAT,
    }
}

/// Whether a depth format also carries stencil bits
pub fn has_stencil(format: AttachmentFormat) -> bool {
    matches!(format, AttachmentFormat::D24UnormS8Uint)
}

#[cfg(test)]
#[path = "vulkan_conv_tests.rs"]
mod tests;
