/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use cullgraph_engine::cullgraph::{DeviceId, Error, Result};
use cullgraph_engine::cullgraph::descriptor::DescriptorSetLayoutBinding;
use cullgraph_engine::cullgraph::device::{
    BufferUsage, ComputePipelineDesc, DescriptorPoolDesc, DescriptorValue, DescriptorWrite,
    DeviceBuffer, DeviceFeatures, DynamicState, GraphicsDevice, GraphicsPipelineDesc, NativeHandle,
    PrimitiveTopology, PushConstantRange, ShaderStageDesc,
};
use cullgraph_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_trace};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_conv::*;

const SOURCE: &str = "cullgraph::vulkan";

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Map a failed Vulkan call to an engine error, logging it
fn vk_error(what: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!(SOURCE, "Out of memory while trying to {}: {:?}", what, result);
            Error::OutOfMemory
        }
        _ => engine_err!(SOURCE, "Failed to {}: {:?}", what, result),
    }
}

/// Vulkan logical device seen through the engine's device boundary
///
/// The instance, physical device and logical device are created by the
/// caller and must outlive this wrapper. Every native object created here is
/// returned as a `NativeHandle` holding the raw Vulkan handle value.
pub struct VulkanGraphicsDevice {
    id: DeviceId,
    features: DeviceFeatures,
    /// Shared GPU context for all buffers created by this device
    ctx: Arc<GpuContext>,
    /// Descriptor pool capacities, to report exhaustion
    pool_capacities: Mutex<FxHashMap<NativeHandle, u32>>,
}

impl VulkanGraphicsDevice {
    /// Wrap an externally created device
    ///
    /// `multi_draw_indirect` is reported when the physical device supports
    /// it; the caller is expected to have enabled it on `device` in that case.
    pub fn from_existing(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue_family_index: u32,
    ) -> Result<Arc<Self>> {
        // SAFETY: physical_device was enumerated from instance by the caller
        let supported = unsafe { instance.get_physical_device_features(physical_device) };
        let features = DeviceFeatures {
            multi_draw_indirect: supported.multi_draw_indirect == vk::TRUE,
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let id = DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed));
        engine_info!(SOURCE, "Vulkan device {} wrapped (multi-draw-indirect: {})",
            id.0, features.multi_draw_indirect);

        Ok(Arc::new(Self {
            id,
            features,
            ctx: Arc::new(GpuContext::new(instance, physical_device, device, allocator, queue_family_index)),
            pool_capacities: Mutex::new(FxHashMap::default()),
        }))
    }

    /// Raw logical device, for submission and synchronization done by the caller
    pub fn device(&self) -> &ash::Device {
        &self.ctx.device
    }

    /// New primary command list on this device's queue family
    pub fn create_command_list(&self) -> Result<VulkanCommandList> {
        VulkanCommandList::new(self.ctx.device.clone(), self.ctx.queue_family_index)
    }

    fn pool_capacity(&self, pool: NativeHandle) -> u32 {
        self.pool_capacities
            .lock()
            .map(|capacities| capacities.get(&pool).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn shader_stage_info<'a>(stage: &ShaderStageDesc, name: &'a CString) -> vk::PipelineShaderStageCreateInfo<'a> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(stage_flags_to_vk(stage.stage))
            .module(raw(stage.module))
            .name(name)
    }

    fn entry_point(name: &str) -> Result<CString> {
        CString::new(name)
            .map_err(|_| Error::InvalidResource(format!("entry point '{}' contains a NUL byte", name)))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn features(&self) -> DeviceFeatures {
        self.features
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<NativeHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(stage_flags_to_vk(b.stages))
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let layout = unsafe { self.ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| vk_error("create descriptor set layout", e))?;
        engine_debug!(SOURCE, "created descriptor set layout {:?} ({} bindings)", layout, bindings.len());
        Ok(native(layout))
    }

    fn destroy_descriptor_set_layout(&self, layout: NativeHandle) {
        engine_trace!(SOURCE, "destroying descriptor set layout {:?}", layout);
        unsafe { self.ctx.device.destroy_descriptor_set_layout(raw(layout), None) }
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<NativeHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
            .sizes
            .iter()
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(ty),
                descriptor_count,
            })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(desc.max_sets);

        let pool = unsafe { self.ctx.device.create_descriptor_pool(&info, None) }
            .map_err(|e| vk_error("create descriptor pool", e))?;
        let handle = native(pool);
        if let Ok(mut capacities) = self.pool_capacities.lock() {
            capacities.insert(handle, desc.max_sets);
        }
        engine_debug!(SOURCE, "created descriptor pool {:?} for {} sets", pool, desc.max_sets);
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: NativeHandle) {
        engine_trace!(SOURCE, "destroying descriptor pool {:?}", pool);
        if let Ok(mut capacities) = self.pool_capacities.lock() {
            capacities.remove(&pool);
        }
        unsafe { self.ctx.device.destroy_descriptor_pool(raw(pool), None) }
    }

    fn allocate_descriptor_set(&self, pool: NativeHandle, layout: NativeHandle) -> Result<NativeHandle> {
        let layouts = [raw::<vk::DescriptorSetLayout>(layout)];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(raw(pool))
            .set_layouts(&layouts);

        match unsafe { self.ctx.device.allocate_descriptor_sets(&info) } {
            Ok(sets) => {
                let Some(&set) = sets.first() else {
                    engine_bail!(SOURCE, "descriptor set allocation returned no set");
                };
                engine_trace!(SOURCE, "allocated descriptor set {:?} from pool {:?}", set, pool);
                Ok(native(set))
            }
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                let capacity = self.pool_capacity(pool);
                engine_error!(SOURCE, "descriptor pool {:?} exhausted ({} sets)", pool, capacity);
                Err(Error::PoolExhausted { capacity })
            }
            Err(e) => Err(vk_error("allocate descriptor set", e)),
        }
    }

    fn free_descriptor_set(&self, pool: NativeHandle, set: NativeHandle) -> Result<()> {
        engine_trace!(SOURCE, "freeing descriptor set {:?}", set);
        unsafe { self.ctx.device.free_descriptor_sets(raw(pool), &[raw(set)]) }
            .map_err(|e| vk_error("free descriptor set", e))
    }

    fn update_descriptor_set(&self, set: NativeHandle, writes: &[DescriptorWrite]) -> Result<()> {
        // Info arrays must outlive the write structs pointing at them
        let mut buffer_infos: Vec<Vec<vk::DescriptorBufferInfo>> = Vec::with_capacity(writes.len());
        let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::with_capacity(writes.len());
        for write in writes {
            let mut buffers = Vec::new();
            let mut images = Vec::new();
            for value in &write.values {
                match *value {
                    DescriptorValue::Buffer { buffer, offset, range } => buffers.push(vk::DescriptorBufferInfo {
                        buffer: raw(buffer),
                        offset,
                        range,
                    }),
                    DescriptorValue::Image { sampler, image_view, layout } => images.push(vk::DescriptorImageInfo {
                        sampler: sampler.map(raw::<vk::Sampler>).unwrap_or_default(),
                        image_view: raw(image_view),
                        image_layout: image_layout_to_vk(layout),
                    }),
                }
            }
            buffer_infos.push(buffers);
            image_infos.push(images);
        }

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(buffer_infos.iter().zip(&image_infos))
            .map(|(write, (buffers, images))| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(raw(set))
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type_to_vk(write.descriptor_type));
                if write.descriptor_type.is_buffer() {
                    vk_write.buffer_info(buffers)
                } else {
                    vk_write.image_info(images)
                }
            })
            .collect();

        unsafe { self.ctx.device.update_descriptor_sets(&vk_writes, &[]) };
        engine_trace!(SOURCE, "wrote {} bindings into descriptor set {:?}", writes.len(), set);
        Ok(())
    }

    // ===== PIPELINES =====

    fn create_pipeline_layout(
        &self,
        set_layouts: &[NativeHandle],
        push_constants: &[PushConstantRange],
    ) -> Result<NativeHandle> {
        let layouts: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|&l| raw(l)).collect();
        let ranges: Vec<vk::PushConstantRange> = push_constants
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&layouts)
            .push_constant_ranges(&ranges);

        let layout = unsafe { self.ctx.device.create_pipeline_layout(&info, None) }
            .map_err(|e| vk_error("create pipeline layout", e))?;
        engine_debug!(SOURCE, "created pipeline layout {:?} ({} sets)", layout, layouts.len());
        Ok(native(layout))
    }

    fn destroy_pipeline_layout(&self, layout: NativeHandle) {
        engine_trace!(SOURCE, "destroying pipeline layout {:?}", layout);
        unsafe { self.ctx.device.destroy_pipeline_layout(raw(layout), None) }
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<NativeHandle> {
        let info = vk::PipelineCacheCreateInfo::default().initial_data(initial_data);
        let cache = unsafe { self.ctx.device.create_pipeline_cache(&info, None) }
            .map_err(|e| vk_error("create pipeline cache", e))?;
        engine_debug!(SOURCE, "created pipeline cache {:?}", cache);
        Ok(native(cache))
    }

    fn destroy_pipeline_cache(&self, cache: NativeHandle) {
        engine_trace!(SOURCE, "destroying pipeline cache {:?}", cache);
        unsafe { self.ctx.device.destroy_pipeline_cache(raw(cache), None) }
    }

    fn create_shader_module(&self, code: &[u8]) -> Result<NativeHandle> {
        let words = ash::util::read_spv(&mut std::io::Cursor::new(code)).map_err(|e| {
            engine_error!(SOURCE, "Invalid SPIR-V ({} bytes): {}", code.len(), e);
            Error::InvalidResource(format!("invalid SPIR-V: {}", e))
        })?;
        let info = vk::ShaderModuleCreateInfo::default().code(&words);

        let module = unsafe { self.ctx.device.create_shader_module(&info, None) }
            .map_err(|e| vk_error("create shader module", e))?;
        engine_debug!(SOURCE, "created shader module {:?} ({} words)", module, words.len());
        Ok(native(module))
    }

    fn destroy_shader_module(&self, module: NativeHandle) {
        engine_trace!(SOURCE, "destroying shader module {:?}", module);
        unsafe { self.ctx.device.destroy_shader_module(raw(module), None) }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<NativeHandle> {
        let fixed = desc.fixed;

        let entry_points = desc
            .stages
            .iter()
            .map(|stage| Self::entry_point(stage.entry_point))
            .collect::<Result<Vec<_>>>()?;
        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = desc
            .stages
            .iter()
            .zip(&entry_points)
            .map(|(stage, name)| Self::shader_stage_info(stage, name))
            .collect();

        // Vertex input state
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(fixed.topology))
            .primitive_restart_enable(fixed.primitive_restart);

        let tessellation_state = vk::PipelineTessellationStateCreateInfo::default()
            .patch_control_points(fixed.patch_control_points);

        // Viewport state: counts only when the values are set on the command list
        let viewports: Vec<vk::Viewport> = fixed
            .viewports
            .iter()
            .map(|v| vk::Viewport {
                x: v.x,
                y: v.y,
                width: v.width,
                height: v.height,
                min_depth: v.min_depth,
                max_depth: v.max_depth,
            })
            .collect();
        let scissors: Vec<vk::Rect2D> = fixed
            .scissors
            .iter()
            .map(|s| vk::Rect2D {
                offset: vk::Offset2D { x: s.x, y: s.y },
                extent: vk::Extent2D { width: s.width, height: s.height },
            })
            .collect();
        let mut viewport_state = vk::PipelineViewportStateCreateInfo::default();
        viewport_state = if fixed.dynamic_states.contains(&DynamicState::Viewport) {
            viewport_state.viewport_count(viewports.len().max(1) as u32)
        } else {
            viewport_state.viewports(&viewports)
        };
        viewport_state = if fixed.dynamic_states.contains(&DynamicState::Scissor) {
            viewport_state.scissor_count(scissors.len().max(1) as u32)
        } else {
            viewport_state.scissors(&scissors)
        };

        let rasterization = &fixed.rasterization;
        let mut rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(rasterization.depth_clamp)
            .rasterizer_discard_enable(rasterization.rasterizer_discard)
            .polygon_mode(polygon_mode_to_vk(rasterization.polygon_mode))
            .line_width(rasterization.line_width)
            .cull_mode(cull_mode_to_vk(rasterization.cull_mode))
            .front_face(front_face_to_vk(rasterization.front_face));
        if let Some(bias) = rasterization.depth_bias {
            rasterization_state = rasterization_state
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_slope_factor(bias.slope_factor)
                .depth_bias_clamp(bias.clamp);
        }

        let depth_stencil = &fixed.depth_stencil;
        let (min_depth_bounds, max_depth_bounds) = depth_stencil.depth_bounds.unwrap_or((0.0, 1.0));
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(depth_stencil.depth_test_enable)
            .depth_write_enable(depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(depth_stencil.depth_bounds.is_some())
            .min_depth_bounds(min_depth_bounds)
            .max_depth_bounds(max_depth_bounds)
            .stencil_test_enable(depth_stencil.stencil_test_enable)
            .front(stencil_op_state_to_vk(&depth_stencil.front))
            .back(stencil_op_state_to_vk(&depth_stencil.back));

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(fixed.multisample.samples))
            .sample_shading_enable(fixed.multisample.sample_shading.is_some())
            .min_sample_shading(fixed.multisample.sample_shading.unwrap_or(0.0))
            .alpha_to_coverage_enable(fixed.multisample.alpha_to_coverage);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> =
            fixed.blend_attachments.iter().map(blend_attachment_to_vk).collect();
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments)
            .blend_constants(fixed.blend_constants);

        let dynamic_states: Vec<vk::DynamicState> =
            fixed.dynamic_states.iter().map(|&s| dynamic_state_to_vk(s)).collect();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // Dynamic rendering: attachment formats instead of a render pass
        let color_formats: Vec<vk::Format> =
            fixed.color_formats.iter().map(|&f| attachment_format_to_vk(f)).collect();
        let depth_format = fixed.depth_format.map(attachment_format_to_vk).unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = match fixed.depth_format {
            Some(format) if has_stencil(format) => depth_format,
            _ => vk::Format::UNDEFINED,
        };
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let mut pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut rendering_info)
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(raw(desc.layout));
        if fixed.topology == PrimitiveTopology::PatchList {
            pipeline_create_info = pipeline_create_info.tessellation_state(&tessellation_state);
        }

        let pipelines = unsafe {
            self.ctx.device.create_graphics_pipelines(raw(desc.cache), &[pipeline_create_info], None)
        }
        .map_err(|(_, e)| vk_error("create graphics pipeline", e))?;
        let Some(&pipeline) = pipelines.first() else {
            engine_bail!(SOURCE, "graphics pipeline creation returned no pipeline");
        };
        engine_debug!(SOURCE, "created graphics pipeline {:?} ({} stages)", pipeline, desc.stages.len());
        Ok(native(pipeline))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<NativeHandle> {
        let name = Self::entry_point(desc.stage.entry_point)?;
        let info = vk::ComputePipelineCreateInfo::default()
            .stage(Self::shader_stage_info(&desc.stage, &name))
            .layout(raw(desc.layout));

        let pipelines = unsafe { self.ctx.device.create_compute_pipelines(raw(desc.cache), &[info], None) }
            .map_err(|(_, e)| vk_error("create compute pipeline", e))?;
        let Some(&pipeline) = pipelines.first() else {
            engine_bail!(SOURCE, "compute pipeline creation returned no pipeline");
        };
        engine_debug!(SOURCE, "created compute pipeline {:?}", pipeline);
        Ok(native(pipeline))
    }

    fn destroy_pipeline(&self, pipeline: NativeHandle) {
        engine_trace!(SOURCE, "destroying pipeline {:?}", pipeline);
        unsafe { self.ctx.device.destroy_pipeline(raw(pipeline), None) }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<Arc<dyn DeviceBuffer>> {
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage_to_vk(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let device = &self.ctx.device;
        let buffer = unsafe { device.create_buffer(&buffer_create_info, None) }
            .map_err(|e| vk_error(&format!("create buffer of size {} bytes", size), e))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = self
            .ctx
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator lock poisoned".to_string()))
            .and_then(|mut allocator| {
                allocator
                    .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                        name: "cullgraph buffer",
                        requirements,
                        location: gpu_allocator::MemoryLocation::CpuToGpu,
                        linear: true,
                        allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|_| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!(SOURCE, "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                        Error::OutOfMemory
                    })
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            if let Ok(mut allocator) = self.ctx.allocator.lock() {
                allocator.free(allocation).ok();
            }
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(vk_error("bind buffer memory", e));
        }

        engine_debug!(SOURCE, "created buffer {:?} ({} bytes, {:?})", buffer, size, usage);
        Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), buffer, allocation, size)))
    }
}
