/// Descriptor set layouts and pools

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::context::{DeviceId, RenderContext};
use crate::device::{DescriptorPoolDesc, DescriptorType, GraphicsDevice, NativeHandle, ShaderStageFlags};
use crate::error::{Error, Result};
use crate::validation::{lock, PerDeviceCache, Validatable};
use crate::{engine_bail_contract, engine_debug, engine_raise};

const LAYOUT_SOURCE: &str = "cullgraph::DescriptorSetLayout";
const POOL_SOURCE: &str = "cullgraph::DescriptorPool";

/// One (binding, count, type, stage mask) tuple of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub count: u32,
    pub descriptor_type: DescriptorType,
    pub stages: ShaderStageFlags,
}

impl DescriptorSetLayoutBinding {
    pub fn new(binding: u32, count: u32, descriptor_type: DescriptorType, stages: ShaderStageFlags) -> Self {
        Self { binding, count, descriptor_type, stages }
    }
}

fn check_bindings(source: &str, bindings: &[DescriptorSetLayoutBinding]) -> Result<()> {
    if bindings.is_empty() {
        engine_bail_contract!(source, "zero bindings");
    }
    let mut seen = BTreeSet::new();
    for b in bindings {
        if b.count == 0 {
            engine_bail_contract!(source, "binding {} has descriptor count 0", b.binding);
        }
        if !seen.insert(b.binding) {
            engine_bail_contract!(source, "binding {} declared twice", b.binding);
        }
    }
    Ok(())
}

// ============================================================================
// DescriptorSetLayout
// ============================================================================

/// Immutable binding shape; one native layout per device
pub struct DescriptorSetLayout {
    bindings: Vec<DescriptorSetLayoutBinding>,
    cache: Mutex<PerDeviceCache<NativeHandle>>,
}

impl DescriptorSetLayout {
    /// Fails on zero bindings, duplicate binding numbers or zero counts
    pub fn new(bindings: Vec<DescriptorSetLayoutBinding>) -> Result<Arc<Self>> {
        check_bindings(LAYOUT_SOURCE, &bindings)?;
        Ok(Arc::new(Self {
            bindings,
            cache: Mutex::new(PerDeviceCache::new()),
        }))
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorSetLayoutBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }

    pub fn descriptor_type(&self, binding: u32) -> Option<DescriptorType> {
        self.binding(binding).map(|b| b.descriptor_type)
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.cache, LAYOUT_SOURCE)?.handle(ctx.device_id(), "DescriptorSetLayout")
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        lock(&self.cache, LAYOUT_SOURCE).map(|c| c.build_count(device)).unwrap_or(0)
    }
}

impl Validatable for DescriptorSetLayout {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        lock(&self.cache, LAYOUT_SOURCE)?.validate_with(
            ctx,
            |device| {
                let handle = device.create_descriptor_set_layout(&self.bindings)?;
                engine_debug!(LAYOUT_SOURCE, "created {:?} with {} bindings", handle, self.bindings.len());
                Ok(handle)
            },
            |device, old| device.destroy_descriptor_set_layout(old),
        )?;
        Ok(())
    }

    /// Bindings are fixed at construction; the native layout never goes stale
    fn invalidate(&self) {}
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        if let Ok(cache) = self.cache.get_mut() {
            cache.clear(|device, handle| device.destroy_descriptor_set_layout(handle));
        }
    }
}

// ============================================================================
// DescriptorPool
// ============================================================================

#[derive(Default)]
struct PoolState {
    cache: PerDeviceCache<NativeHandle>,
    allocated: FxHashMap<DeviceId, u32>,
}

/// Fixed-capacity descriptor set allocator; one native pool per device
///
/// `pool_size` is the number of sets the pool can hand out per device. The
/// pool's shape never changes, so `invalidate()` has nothing to rebuild.
pub struct DescriptorPool {
    pool_size: u32,
    bindings: Vec<DescriptorSetLayoutBinding>,
    state: Mutex<PoolState>,
}

impl DescriptorPool {
    /// Fails on zero capacity or an invalid binding shape
    pub fn new(pool_size: u32, bindings: Vec<DescriptorSetLayoutBinding>) -> Result<Arc<Self>> {
        if pool_size == 0 {
            engine_bail_contract!(POOL_SOURCE, "pool capacity 0");
        }
        check_bindings(POOL_SOURCE, &bindings)?;
        Ok(Arc::new(Self {
            pool_size,
            bindings,
            state: Mutex::new(PoolState::default()),
        }))
    }

    /// Pool sized for `pool_size` sets of `layout`'s shape
    pub fn for_layout(pool_size: u32, layout: &DescriptorSetLayout) -> Result<Arc<Self>> {
        Self::new(pool_size, layout.bindings().to_vec())
    }

    pub fn capacity(&self) -> u32 {
        self.pool_size
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Whether every binding of `layout` can be served by this pool
    pub fn supports(&self, layout: &DescriptorSetLayout) -> bool {
        layout
            .bindings()
            .iter()
            .all(|b| self.bindings.iter().any(|p| p.descriptor_type == b.descriptor_type))
    }

    /// Native pool description: per-type totals scaled by capacity
    pub fn native_desc(&self) -> DescriptorPoolDesc {
        let mut sizes: BTreeMap<DescriptorType, u32> = BTreeMap::new();
        for b in &self.bindings {
            *sizes.entry(b.descriptor_type).or_insert(0) += b.count * self.pool_size;
        }
        DescriptorPoolDesc {
            max_sets: self.pool_size,
            sizes: sizes.into_iter().collect(),
        }
    }

    pub fn allocated_count(&self, device: DeviceId) -> u32 {
        lock(&self.state, POOL_SOURCE)
            .map(|s| s.allocated.get(&device).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.state, POOL_SOURCE)?.cache.handle(ctx.device_id(), "DescriptorPool")
    }

    /// Allocate one set of `layout` from the device's pool
    ///
    /// Fails with `Error::PoolExhausted` once `capacity()` sets are live.
    pub(crate) fn allocate(&self, device: &dyn GraphicsDevice, layout: NativeHandle) -> Result<NativeHandle> {
        let mut state = lock(&self.state, POOL_SOURCE)?;
        let pool = state.cache.handle(device.id(), "DescriptorPool")?;
        let allocated = state.allocated.get(&device.id()).copied().unwrap_or(0);
        if allocated >= self.pool_size {
            return Err(engine_raise!(POOL_SOURCE, Error::PoolExhausted { capacity: self.pool_size }));
        }
        let set = device
            .allocate_descriptor_set(pool, layout)
            .map_err(|e| engine_raise!(POOL_SOURCE, e))?;
        state.allocated.insert(device.id(), allocated + 1);
        engine_debug!(POOL_SOURCE, "allocated {:?} ({}/{})", set, allocated + 1, self.pool_size);
        Ok(set)
    }

    /// Return a set to the device's pool
    pub(crate) fn free(&self, device: &dyn GraphicsDevice, set: NativeHandle) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let Ok(pool) = state.cache.handle(device.id(), "DescriptorPool") else {
            return;
        };
        if device.free_descriptor_set(pool, set).is_ok() {
            if let Some(count) = state.allocated.get_mut(&device.id()) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

impl Validatable for DescriptorPool {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        let desc = self.native_desc();
        lock(&self.state, POOL_SOURCE)?.cache.validate_with(
            ctx,
            |device| {
                let handle = device.create_descriptor_pool(&desc)?;
                engine_debug!(POOL_SOURCE, "created {:?} for {} sets", handle, desc.max_sets);
                Ok(handle)
            },
            |device, old| device.destroy_descriptor_pool(old),
        )?;
        Ok(())
    }

    fn invalidate(&self) {}
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.cache.clear(|device, handle| device.destroy_descriptor_pool(handle));
        }
    }
}
