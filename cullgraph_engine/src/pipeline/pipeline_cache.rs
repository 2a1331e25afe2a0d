/// PipelineCache - native pipeline cache shared by the pipelines it is passed to

use std::sync::{Arc, Mutex};
use crate::context::RenderContext;
use crate::device::NativeHandle;
use crate::engine_debug;
use crate::error::Result;
use crate::validation::{lock, PerDeviceCache, Validatable};

const SOURCE: &str = "cullgraph::PipelineCache";

/// Shared explicitly: every pipeline constructor takes an `Arc<PipelineCache>`
pub struct PipelineCache {
    initial_data: Vec<u8>,
    cache: Mutex<PerDeviceCache<NativeHandle>>,
}

impl PipelineCache {
    pub fn new() -> Arc<Self> {
        Self::with_initial_data(Vec::new())
    }

    /// Cache seeded with data previously saved from a native cache
    pub fn with_initial_data(initial_data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            initial_data,
            cache: Mutex::new(PerDeviceCache::new()),
        })
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.cache, SOURCE)?.handle(ctx.device_id(), "PipelineCache")
    }
}

impl Validatable for PipelineCache {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        lock(&self.cache, SOURCE)?.validate_with(
            ctx,
            |device| {
                let handle = device.create_pipeline_cache(&self.initial_data)?;
                engine_debug!(SOURCE, "created {:?}", handle);
                Ok(handle)
            },
            |device, old| device.destroy_pipeline_cache(old),
        )?;
        Ok(())
    }

    /// Cache contents never go stale
    fn invalidate(&self) {}
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        if let Ok(cache) = self.cache.get_mut() {
            cache.clear(|device, handle| device.destroy_pipeline_cache(handle));
        }
    }
}
