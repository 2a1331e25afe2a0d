/// Backend-neutral handle, flag and descriptor types

use bitflags::bitflags;

/// Opaque native object handle
///
/// Backends store their raw handle value here (`vk::Handle::as_raw()` for
/// Vulkan). Zero is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

// ===== DESCRIPTORS =====

/// Data-access type of a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorType {
    /// Whether values of this type are buffer ranges
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer
                | DescriptorType::StorageBuffer
                | DescriptorType::UniformBufferDynamic
                | DescriptorType::StorageBufferDynamic
        )
    }
}

/// Image layout an image view is bound in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    General,
    ShaderReadOnly,
    DepthStencilReadOnly,
}

/// Snapshot of a resource as written into a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorValue {
    Buffer {
        buffer: NativeHandle,
        offset: u64,
        range: u64,
    },
    Image {
        sampler: Option<NativeHandle>,
        image_view: NativeHandle,
        layout: ImageLayout,
    },
}

/// One binding written into a native descriptor set
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub values: Vec<DescriptorValue>,
}

/// Native descriptor pool shape
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPoolDesc {
    pub max_sets: u32,
    /// Total descriptors of each type across all sets
    pub sizes: Vec<(DescriptorType, u32)>,
}

// ===== FLAGS =====

bitflags! {
    /// Shader stages a binding or push constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
    }
}

bitflags! {
    /// Memory access types used in buffer barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const UNIFORM_READ = 1 << 3;
        const SHADER_READ = 1 << 5;
        const SHADER_WRITE = 1 << 6;
        const TRANSFER_READ = 1 << 11;
        const TRANSFER_WRITE = 1 << 12;
        const HOST_READ = 1 << 13;
        const HOST_WRITE = 1 << 14;
    }
}

bitflags! {
    /// Pipeline stages used as barrier scopes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const DRAW_INDIRECT = 1 << 1;
        const VERTEX_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 7;
        const COMPUTE_SHADER = 1 << 11;
        const TRANSFER = 1 << 12;
        const BOTTOM_OF_PIPE = 1 << 13;
        const HOST = 1 << 14;
    }
}

bitflags! {
    /// How a device buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
        const INDEX = 1 << 6;
        const VERTEX = 1 << 7;
        const INDIRECT = 1 << 8;
    }
}

/// Bind point of a pipeline or descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
