/// ShaderModule - immutable SPIR-V code, one native module per device

use std::sync::{Arc, Mutex};
use crate::context::{DeviceId, RenderContext};
use crate::device::{NativeHandle, ShaderStageFlags};
use crate::error::Result;
use crate::validation::{lock, PerDeviceCache, Validatable};
use crate::{engine_bail_contract, engine_debug};

const SOURCE: &str = "cullgraph::ShaderModule";

pub struct ShaderModule {
    name: String,
    code: Vec<u8>,
    cache: Mutex<PerDeviceCache<NativeHandle>>,
}

impl ShaderModule {
    /// Fails on empty code or a length that is not a whole number of SPIR-V words
    pub fn new(name: impl Into<String>, code: Vec<u8>) -> Result<Arc<Self>> {
        let name = name.into();
        if code.is_empty() || code.len() % 4 != 0 {
            engine_bail_contract!(SOURCE, "shader '{}': {} bytes is not valid SPIR-V", name, code.len());
        }
        Ok(Arc::new(Self {
            name,
            code,
            cache: Mutex::new(PerDeviceCache::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.cache, SOURCE)?.handle(ctx.device_id(), "ShaderModule")
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        lock(&self.cache, SOURCE).map(|c| c.build_count(device)).unwrap_or(0)
    }
}

impl Validatable for ShaderModule {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        lock(&self.cache, SOURCE)?.validate_with(
            ctx,
            |device| {
                let handle = device.create_shader_module(&self.code)?;
                engine_debug!(SOURCE, "created '{}' as {:?}", self.name, handle);
                Ok(handle)
            },
            |device, old| device.destroy_shader_module(old),
        )?;
        Ok(())
    }

    fn invalidate(&self) {}
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        if let Ok(cache) = self.cache.get_mut() {
            cache.clear(|device, handle| device.destroy_shader_module(handle));
        }
    }
}

/// Module + stage + entry point
#[derive(Clone)]
pub struct ShaderStageDefinition {
    pub stage: ShaderStageFlags,
    pub module: Arc<ShaderModule>,
    pub entry_point: String,
}

impl ShaderStageDefinition {
    /// Stage with the conventional `main` entry point
    pub fn new(stage: ShaderStageFlags, module: Arc<ShaderModule>) -> Self {
        Self {
            stage,
            module,
            entry_point: "main".to_string(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}
