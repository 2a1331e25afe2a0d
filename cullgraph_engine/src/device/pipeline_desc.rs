/// Fixed-function pipeline state and the flattened descriptions handed to backends

use crate::device::{NativeHandle, ShaderStageFlags};

// ===== VERTEX INPUT =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Format of one vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float,
    Vec2,
    Vec3,
    Vec4,
    UInt,
    UVec4,
}

impl VertexFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::Float | VertexFormat::UInt => 4,
            VertexFormat::Vec2 => 8,
            VertexFormat::Vec3 => 12,
            VertexFormat::Vec4 | VertexFormat::UVec4 => 16,
        }
    }
}

/// One vertex buffer binding and the tightly packed attributes it feeds
///
/// Attribute locations are assigned in declaration order across all
/// definitions of a pipeline; offsets and stride follow from the formats.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInputDefinition {
    pub binding: u32,
    pub input_rate: VertexInputRate,
    pub attributes: Vec<VertexFormat>,
}

impl VertexInputDefinition {
    pub fn new(binding: u32, input_rate: VertexInputRate, attributes: Vec<VertexFormat>) -> Self {
        Self { binding, input_rate, attributes }
    }

    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(|a| a.size_bytes()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBindingDesc {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeDesc {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

// ===== INPUT ASSEMBLY / RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    PatchList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub clamp: f32,
    pub slope_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub depth_clamp: bool,
    pub rasterizer_discard: bool,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias: Option<DepthBias>,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            depth_clamp: false,
            rasterizer_discard: false,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_bias: None,
            line_width: 1.0,
        }
    }
}

// ===== DEPTH/STENCIL =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl Default for StencilOpState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
            compare_mask: 0,
            write_mask: 0,
            reference: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub depth_bounds: Option<(f32, f32)>,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::LessOrEqual,
            depth_bounds: None,
            stencil_test_enable: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

// ===== COLOR BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGBA = Self::R.bits() | Self::G.bits() | Self::B.bits() | Self::A.bits();
    }
}

/// Blend setup of one color attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendAttachmentDefinition {
    pub blend_enable: bool,
    pub color_write_mask: ColorWriteMask,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl Default for BlendAttachmentDefinition {
    fn default() -> Self {
        Self {
            blend_enable: false,
            color_write_mask: ColorWriteMask::RGBA,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

// ===== VIEWPORT / DYNAMIC / MULTISAMPLE =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// State that is set by command-list calls instead of being baked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
    LineWidth,
    DepthBias,
    BlendConstants,
    DepthBounds,
    StencilCompareMask,
    StencilWriteMask,
    StencilReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultisampleState {
    pub samples: SampleCount,
    pub sample_shading: Option<f32>,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: SampleCount::S1,
            sample_shading: None,
            alpha_to_coverage: false,
        }
    }
}

/// Attachment formats the pipeline renders into (dynamic rendering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    R8G8B8A8Unorm,
    R16G16B16A16Sfloat,
    D24UnormS8Uint,
    D32Sfloat,
}

/// Everything a graphics pipeline bakes in besides shaders and vertex input
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionState {
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    pub patch_control_points: u32,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub blend_attachments: Vec<BlendAttachmentDefinition>,
    pub blend_constants: [f32; 4],
    pub multisample: MultisampleState,
    pub viewports: Vec<Viewport>,
    pub scissors: Vec<Rect2D>,
    pub dynamic_states: Vec<DynamicState>,
    pub color_formats: Vec<AttachmentFormat>,
    pub depth_format: Option<AttachmentFormat>,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            patch_control_points: 0,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            blend_attachments: vec![BlendAttachmentDefinition::default()],
            blend_constants: [0.0; 4],
            multisample: MultisampleState::default(),
            viewports: Vec::new(),
            scissors: Vec::new(),
            dynamic_states: Vec::new(),
            color_formats: vec![AttachmentFormat::B8G8R8A8Unorm],
            depth_format: Some(AttachmentFormat::D24UnormS8Uint),
        }
    }
}

// ===== BACKEND DESCRIPTIONS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// One shader stage with its module already validated for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageDesc<'a> {
    pub stage: ShaderStageFlags,
    pub module: NativeHandle,
    pub entry_point: &'a str,
}

/// Flattened graphics pipeline, ready for the backend
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc<'a> {
    pub layout: NativeHandle,
    pub cache: NativeHandle,
    pub stages: &'a [ShaderStageDesc<'a>],
    pub vertex_bindings: &'a [VertexBindingDesc],
    pub vertex_attributes: &'a [VertexAttributeDesc],
    pub fixed: &'a FixedFunctionState,
}

#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDesc<'a> {
    pub layout: NativeHandle,
    pub cache: NativeHandle,
    pub stage: ShaderStageDesc<'a>,
}
