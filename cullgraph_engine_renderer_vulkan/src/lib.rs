/*!
# Cullgraph Engine - Vulkan Backend

Vulkan implementation of the cullgraph engine's device boundary.

This crate implements the `GraphicsDevice` and `CommandList` traits of
`cullgraph_engine` using the Ash library for Vulkan bindings and
gpu-allocator for buffer memory. Instance, physical device, logical device
and presentation are provisioned by the application; the backend wraps the
resulting handles.

Graphics pipelines are created for dynamic rendering (Vulkan 1.3), so the
caller must enable `dynamicRendering`, and `multiDrawIndirect` when it wants
one indirect draw per culling category.
*/

mod vulkan_context;
mod vulkan_conv;
mod vulkan_buffer;
mod vulkan_device;
mod vulkan_command_list;

pub use vulkan_device::VulkanGraphicsDevice;
pub use vulkan_command_list::VulkanCommandList;
