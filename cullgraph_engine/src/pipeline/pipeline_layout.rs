/// PipelineLayout - ordered descriptor set layouts plus push constant ranges

use std::sync::{Arc, Mutex};
use crate::context::{DeviceId, RenderContext};
use crate::descriptor::DescriptorSetLayout;
use crate::device::{NativeHandle, PushConstantRange};
use crate::engine_debug;
use crate::error::Result;
use crate::validation::{lock, PerDeviceCache, Validatable};

const SOURCE: &str = "cullgraph::PipelineLayout";

pub struct PipelineLayout {
    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    push_constants: Vec<PushConstantRange>,
    cache: Mutex<PerDeviceCache<NativeHandle>>,
}

impl PipelineLayout {
    pub fn new(set_layouts: Vec<Arc<DescriptorSetLayout>>, push_constants: Vec<PushConstantRange>) -> Arc<Self> {
        Arc::new(Self {
            set_layouts,
            push_constants,
            cache: Mutex::new(PerDeviceCache::new()),
        })
    }

    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    pub fn push_constants(&self) -> &[PushConstantRange] {
        &self.push_constants
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.cache, SOURCE)?.handle(ctx.device_id(), "PipelineLayout")
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        lock(&self.cache, SOURCE).map(|c| c.build_count(device)).unwrap_or(0)
    }
}

impl Validatable for PipelineLayout {
    /// Validates every set layout first, then builds the layout from their handles
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        let mut set_handles = Vec::with_capacity(self.set_layouts.len());
        for layout in &self.set_layouts {
            layout.validate(ctx)?;
            set_handles.push(layout.handle(ctx)?);
        }
        lock(&self.cache, SOURCE)?.validate_with(
            ctx,
            |device| {
                let handle = device.create_pipeline_layout(&set_handles, &self.push_constants)?;
                engine_debug!(SOURCE, "created {:?} with {} set layouts", handle, set_handles.len());
                Ok(handle)
            },
            |device, old| device.destroy_pipeline_layout(old),
        )?;
        Ok(())
    }

    /// Set layouts and push constants are fixed at construction
    fn invalidate(&self) {}
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        if let Ok(cache) = self.cache.get_mut() {
            cache.clear(|device, handle| device.destroy_pipeline_layout(handle));
        }
    }
}
