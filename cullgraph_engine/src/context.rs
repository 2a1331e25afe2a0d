//! Context keying
//!
//! A native object is valid either for a whole device (layouts, pools,
//! pipelines, shader modules, buffers) or for one frame slot of one
//! presentation surface (descriptor sets, command buffers). [`ContextKey`]
//! names that scope; [`RenderContext`] is what callers pass to `validate()`.

use std::fmt;
use std::sync::Arc;
use crate::device::GraphicsDevice;
use crate::error::Result;

/// Identifier of a logical device, supplied by the device wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

/// Identifier of a presentation surface, supplied by the surface machinery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Scope a cached native handle is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    Device(DeviceId),
    SurfaceSlot { surface: SurfaceId, slot: u32 },
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKey::Device(device) => write!(f, "device {}", device.0),
            ContextKey::SurfaceSlot { surface, slot } => {
                write!(f, "surface {} slot {}", surface.0, slot)
            }
        }
    }
}

/// Surface part of a render context for the frame being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFrame {
    pub surface: SurfaceId,
    /// Slot of the frame being prepared, `< frame_count`
    pub active_index: u32,
    /// Frames in flight configured for the surface
    pub frame_count: u32,
}

/// Device (and optionally surface frame) a validate/handle call targets
#[derive(Clone)]
pub struct RenderContext {
    device: Arc<dyn GraphicsDevice>,
    frame: Option<SurfaceFrame>,
}

impl RenderContext {
    /// Context for device-scoped objects only
    pub fn for_device(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device, frame: None }
    }

    /// Context for one frame of a surface
    ///
    /// Built by `SurfaceFrames::begin_frame`, which fixes the active index
    /// once per frame.
    pub(crate) fn for_surface_frame(device: Arc<dyn GraphicsDevice>, frame: SurfaceFrame) -> Self {
        Self { device, frame: Some(frame) }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn surface_frame(&self) -> Option<SurfaceFrame> {
        self.frame
    }

    /// Surface frame, or a contract violation naming `source` when absent
    pub fn require_surface_frame(&self, source: &str) -> Result<SurfaceFrame> {
        match self.frame {
            Some(frame) => Ok(frame),
            None => Err(crate::engine_contract_err!(
                source,
                "surface-scoped object used with a device-only context"
            )),
        }
    }

    /// Key of the device scope
    pub fn device_key(&self) -> ContextKey {
        ContextKey::Device(self.device_id())
    }

    /// Most specific key: surface slot when a frame is set, device otherwise
    pub fn key(&self) -> ContextKey {
        match self.frame {
            Some(frame) => ContextKey::SurfaceSlot {
                surface: frame.surface,
                slot: frame.active_index,
            },
            None => self.device_key(),
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device_id())
            .field("frame", &self.frame)
            .finish()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
