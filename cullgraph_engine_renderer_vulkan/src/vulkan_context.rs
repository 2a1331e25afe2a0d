/// GpuContext - Vulkan handles shared by the device wrapper and its buffers

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

/// Shared GPU context for all Vulkan objects created by one device wrapper.
///
/// Buffers hold an `Arc` to it so their memory can be returned to the
/// allocator whenever they are dropped.
///
/// Note: the instance and logical device are created and destroyed by the
/// caller. Only the allocator is owned here.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// Physical device the logical device was created on
    pub physical_device: vk::PhysicalDevice,

    /// GPU memory allocator (shared, requires mutex for thread safety)
    /// Wrapped in ManuallyDrop so it is released before the caller destroys the device
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Queue family command pools must be created for
    pub queue_family_index: u32,

    /// Vulkan instance (kept for reference, destroyed by the caller)
    #[allow(dead_code)]
    instance: ash::Instance,
}

impl GpuContext {
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queue_family_index: u32,
    ) -> Self {
        Self {
            device,
            physical_device,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
            queue_family_index,
            instance,
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // SAFETY: the allocator is never touched again after this point
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
        }
    }
}
