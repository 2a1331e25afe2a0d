/// Per-device cache of native handles

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::context::{DeviceId, RenderContext};
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};

/// One cached handle and its validity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry<H> {
    pub handle: Option<H>,
    pub valid: bool,
    /// Number of successful (re)builds
    pub builds: u32,
}

impl<H> Default for CacheEntry<H> {
    fn default() -> Self {
        Self { handle: None, valid: false, builds: 0 }
    }
}

impl<H: Copy + PartialEq> CacheEntry<H> {
    /// Absent and invalid are the same case: both need a build
    pub fn needs_build(&self) -> bool {
        !self.valid || self.handle.is_none()
    }

    /// Store a freshly built handle and hand back the one it replaces
    pub fn replace(&mut self, handle: H) -> Option<H> {
        let old = self.handle.replace(handle);
        self.valid = true;
        self.builds += 1;
        old.filter(|old| *old != handle)
    }
}

struct DeviceSlot<H> {
    device: Arc<dyn GraphicsDevice>,
    entry: CacheEntry<H>,
}

/// Device-keyed handle cache
///
/// Owners wrap it in a `Mutex`, which serializes every validate/invalidate of
/// that object. Old handles are destroyed only after their replacement was
/// built; a failed rebuild keeps the previous handle and stays invalid.
pub struct PerDeviceCache<H> {
    entries: FxHashMap<DeviceId, DeviceSlot<H>>,
}

impl<H: Copy + PartialEq> PerDeviceCache<H> {
    pub fn new() -> Self {
        Self { entries: FxHashMap::default() }
    }

    pub fn is_valid(&self, device: DeviceId) -> bool {
        self.entries
            .get(&device)
            .map(|slot| !slot.entry.needs_build())
            .unwrap_or(false)
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        self.entries.get(&device).map(|slot| slot.entry.builds).unwrap_or(0)
    }

    /// Cached handle, `Error::NotValidated` when never validated for `device`
    pub fn handle(&self, device: DeviceId, what: &str) -> Result<H> {
        self.entries
            .get(&device)
            .and_then(|slot| slot.entry.handle)
            .ok_or_else(|| crate::engine_raise!(
                "cullgraph::Validation",
                Error::NotValidated(format!("{} on device {}", what, device.0))
            ))
    }

    /// Mark every device entry for rebuild; handles stay alive
    pub fn invalidate_all(&mut self) {
        for slot in self.entries.values_mut() {
            slot.entry.valid = false;
        }
    }

    pub fn invalidate(&mut self, device: DeviceId) {
        if let Some(slot) = self.entries.get_mut(&device) {
            slot.entry.valid = false;
        }
    }

    /// Return the valid handle for the context's device, building it first if needed
    ///
    /// `build` runs only when the entry is absent or invalid. `destroy` runs on
    /// the replaced handle after `build` succeeded.
    pub fn validate_with<B, D>(&mut self, ctx: &RenderContext, build: B, destroy: D) -> Result<H>
    where
        B: FnOnce(&dyn GraphicsDevice) -> Result<H>,
        D: FnOnce(&dyn GraphicsDevice, H),
    {
        let device = ctx.device();
        let slot = self.entries.entry(ctx.device_id()).or_insert_with(|| DeviceSlot {
            device: device.clone(),
            entry: CacheEntry::default(),
        });

        if !slot.entry.needs_build() {
            if let Some(handle) = slot.entry.handle {
                return Ok(handle);
            }
        }

        let handle = build(device.as_ref())?;
        if let Some(old) = slot.entry.replace(handle) {
            destroy(slot.device.as_ref(), old);
        }
        Ok(handle)
    }

    /// Drop every entry, destroying live handles with their own device
    pub fn clear<D>(&mut self, mut destroy: D)
    where
        D: FnMut(&dyn GraphicsDevice, H),
    {
        for (_, slot) in self.entries.drain() {
            if let Some(handle) = slot.entry.handle {
                destroy(slot.device.as_ref(), handle);
            }
        }
    }
}

impl<H: Copy + PartialEq> Default for PerDeviceCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
