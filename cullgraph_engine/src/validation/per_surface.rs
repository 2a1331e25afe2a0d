/// Per-surface cache with one entry per frame-in-flight slot

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::context::{RenderContext, SurfaceFrame, SurfaceId};
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::validation::CacheEntry;

struct SurfaceSlots<H> {
    device: Arc<dyn GraphicsDevice>,
    slots: Vec<CacheEntry<H>>,
}

/// Surface-keyed handle cache, sized to each surface's frame count
///
/// A frame count change (surface recreated) resizes the slot vector on the
/// next access and marks every slot invalid; handles of dropped slots are
/// destroyed, surviving handles are kept for reuse by the next build.
pub struct PerSurfaceCache<H> {
    surfaces: FxHashMap<SurfaceId, SurfaceSlots<H>>,
}

impl<H: Copy + PartialEq> PerSurfaceCache<H> {
    pub fn new() -> Self {
        Self { surfaces: FxHashMap::default() }
    }

    fn slot(&self, surface: SurfaceId, slot: u32) -> Option<&CacheEntry<H>> {
        self.surfaces
            .get(&surface)
            .and_then(|entry| entry.slots.get(slot as usize))
    }

    pub fn is_valid(&self, surface: SurfaceId, slot: u32) -> bool {
        self.slot(surface, slot).map(|e| !e.needs_build()).unwrap_or(false)
    }

    pub fn build_count(&self, surface: SurfaceId, slot: u32) -> u32 {
        self.slot(surface, slot).map(|e| e.builds).unwrap_or(0)
    }

    /// Number of slots currently held for `surface`
    pub fn slot_count(&self, surface: SurfaceId) -> u32 {
        self.surfaces.get(&surface).map(|e| e.slots.len() as u32).unwrap_or(0)
    }

    /// Cached handle for the frame's active slot
    pub fn handle(&self, frame: SurfaceFrame, what: &str) -> Result<H> {
        self.slot(frame.surface, frame.active_index)
            .and_then(|entry| entry.handle)
            .ok_or_else(|| crate::engine_raise!(
                "cullgraph::Validation",
                Error::NotValidated(format!(
                    "{} on surface {} slot {}",
                    what, frame.surface.0, frame.active_index
                ))
            ))
    }

    /// Mark every slot of every surface for rebuild
    pub fn invalidate_all(&mut self) {
        for entry in self.surfaces.values_mut() {
            for slot in entry.slots.iter_mut() {
                slot.valid = false;
            }
        }
    }

    /// Mark a single slot for rebuild; other slots keep their state
    pub fn invalidate_slot(&mut self, surface: SurfaceId, slot: u32) {
        if let Some(entry) = self.surfaces.get_mut(&surface) {
            if let Some(slot) = entry.slots.get_mut(slot as usize) {
                slot.valid = false;
            }
        }
    }

    /// Return the valid handle for the context's active slot, building it if needed
    ///
    /// `build` receives the slot's previous handle (if any) so it may update
    /// it in place; returning the same handle skips `destroy`.
    pub fn validate_with<B, D>(&mut self, ctx: &RenderContext, source: &str, build: B, mut destroy: D) -> Result<H>
    where
        B: FnOnce(&dyn GraphicsDevice, Option<H>) -> Result<H>,
        D: FnMut(&dyn GraphicsDevice, H),
    {
        let frame = ctx.require_surface_frame(source)?;
        if frame.active_index >= frame.frame_count {
            crate::engine_bail_contract!(
                source,
                "active index {} outside frame count {}",
                frame.active_index,
                frame.frame_count
            );
        }

        let device = ctx.device();
        let entry = self.surfaces.entry(frame.surface).or_insert_with(|| SurfaceSlots {
            device: device.clone(),
            slots: Vec::new(),
        });

        if entry.slots.len() != frame.frame_count as usize {
            crate::engine_debug!(
                source,
                "surface {} frame count {} -> {}, all slots invalidated",
                frame.surface.0,
                entry.slots.len(),
                frame.frame_count
            );
            if entry.slots.len() > frame.frame_count as usize {
                for dropped in entry.slots.drain(frame.frame_count as usize..) {
                    if let Some(handle) = dropped.handle {
                        destroy(entry.device.as_ref(), handle);
                    }
                }
            }
            entry.slots.resize_with(frame.frame_count as usize, CacheEntry::default);
            for slot in entry.slots.iter_mut() {
                slot.valid = false;
            }
        }

        let slot = &mut entry.slots[frame.active_index as usize];
        if !slot.needs_build() {
            if let Some(handle) = slot.handle {
                return Ok(handle);
            }
        }

        let handle = build(device.as_ref(), slot.handle)?;
        if let Some(old) = slot.replace(handle) {
            destroy(entry.device.as_ref(), old);
        }
        Ok(handle)
    }

    /// Forget a surface, destroying its handles
    pub fn remove_surface<D>(&mut self, surface: SurfaceId, mut destroy: D)
    where
        D: FnMut(&dyn GraphicsDevice, H),
    {
        if let Some(entry) = self.surfaces.remove(&surface) {
            for handle in entry.slots.iter().filter_map(|slot| slot.handle) {
                destroy(entry.device.as_ref(), handle);
            }
        }
    }

    /// Drop every surface, destroying live handles
    pub fn clear<D>(&mut self, mut destroy: D)
    where
        D: FnMut(&dyn GraphicsDevice, H),
    {
        for (_, entry) in self.surfaces.drain() {
            for handle in entry.slots.iter().filter_map(|slot| slot.handle) {
                destroy(entry.device.as_ref(), handle);
            }
        }
    }
}

impl<H: Copy + PartialEq> Default for PerSurfaceCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
