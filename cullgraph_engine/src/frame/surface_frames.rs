/// SurfaceFrames - frame count and active slot of one presentation surface

use std::sync::Arc;
use crate::context::{RenderContext, SurfaceFrame, SurfaceId};
use crate::device::GraphicsDevice;
use crate::engine::Engine;
use crate::error::Result;
use crate::{engine_bail_contract, engine_debug, engine_trace};

const SOURCE: &str = "cullgraph::SurfaceFrames";

/// Frame ring of one surface
///
/// The surface machinery calls `begin_frame` once it has acquired the next
/// swapchain image, which fixes the active index for everything validated
/// and recorded during that frame, then `end_frame` after submission.
pub struct SurfaceFrames {
    surface: SurfaceId,
    device: Arc<dyn GraphicsDevice>,
    frame_count: u32,
    active: Option<u32>,
}

impl SurfaceFrames {
    pub fn new(surface: SurfaceId, device: Arc<dyn GraphicsDevice>, frame_count: u32) -> Result<Self> {
        if frame_count == 0 {
            engine_bail_contract!(SOURCE, "surface {} created with 0 frames in flight", surface.0);
        }
        engine_debug!(SOURCE, "surface {} with {} frames in flight", surface.0, frame_count);
        Ok(Self {
            surface,
            device,
            frame_count,
            active: None,
        })
    }

    /// Uses `EngineConfig::frames_in_flight`
    pub fn with_default_frame_count(surface: SurfaceId, device: Arc<dyn GraphicsDevice>) -> Result<Self> {
        Self::new(surface, device, Engine::config().frames_in_flight)
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn active_index(&self) -> Option<u32> {
        self.active
    }

    /// Open a frame on slot `image_index` and return its context
    pub fn begin_frame(&mut self, image_index: u32) -> Result<RenderContext> {
        if let Some(active) = self.active {
            engine_bail_contract!(SOURCE, "surface {}: frame {} still open", self.surface.0, active);
        }
        if image_index >= self.frame_count {
            engine_bail_contract!(
                SOURCE,
                "surface {}: image index {} outside {} frames",
                self.surface.0,
                image_index,
                self.frame_count
            );
        }
        self.active = Some(image_index);
        engine_trace!(SOURCE, "surface {} begin frame {}", self.surface.0, image_index);
        Ok(self.frame_context(image_index))
    }

    /// Context of the open frame, if any
    pub fn context(&self) -> Option<RenderContext> {
        self.active.map(|index| self.frame_context(index))
    }

    pub fn end_frame(&mut self) -> Result<()> {
        match self.active.take() {
            Some(index) => {
                engine_trace!(SOURCE, "surface {} end frame {}", self.surface.0, index);
                Ok(())
            }
            None => engine_bail_contract!(SOURCE, "surface {}: end_frame without begin_frame", self.surface.0),
        }
    }

    /// Change the number of frames in flight (surface recreated)
    ///
    /// Per-surface caches notice the new count on their next validate and
    /// mark every slot of this surface invalid.
    pub fn resize(&mut self, frame_count: u32) -> Result<()> {
        if frame_count == 0 {
            engine_bail_contract!(SOURCE, "surface {} resized to 0 frames", self.surface.0);
        }
        if self.active.is_some() {
            engine_bail_contract!(SOURCE, "surface {} resized while a frame is open", self.surface.0);
        }
        engine_debug!(SOURCE, "surface {} frames in flight {} -> {}", self.surface.0, self.frame_count, frame_count);
        self.frame_count = frame_count;
        Ok(())
    }

    fn frame_context(&self, index: u32) -> RenderContext {
        RenderContext::for_surface_frame(
            self.device.clone(),
            SurfaceFrame {
                surface: self.surface,
                active_index: index,
                frame_count: self.frame_count,
            },
        )
    }
}
