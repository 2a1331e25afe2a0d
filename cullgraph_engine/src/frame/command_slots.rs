/// CommandBufferSlots - per-slot "needs re-recording" flags of a command buffer

use std::sync::Mutex;
use rustc_hash::FxHashMap;
use crate::context::{RenderContext, SurfaceId};
use crate::error::Result;
use crate::node::{Node, NodeVisitor};
use crate::validation::lock;

const SOURCE: &str = "cullgraph::CommandBufferSlots";

/// Record-once bookkeeping for a command buffer replicated per frame slot
///
/// Register it with every descriptor set and pipeline the recorded commands
/// bind; a change to any of them marks every slot for re-recording.
#[derive(Default)]
pub struct CommandBufferSlots {
    dirty: Mutex<FxHashMap<SurfaceId, Vec<bool>>>,
}

impl CommandBufferSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the active slot must be (re)recorded
    ///
    /// Unknown slots and a changed frame count both count as dirty.
    pub fn needs_record(&self, ctx: &RenderContext) -> Result<bool> {
        let frame = ctx.require_surface_frame(SOURCE)?;
        let mut dirty = lock(&self.dirty, SOURCE)?;
        let slots = dirty.entry(frame.surface).or_default();
        if slots.len() != frame.frame_count as usize {
            slots.clear();
            slots.resize(frame.frame_count as usize, true);
        }
        Ok(slots.get(frame.active_index as usize).copied().unwrap_or(true))
    }

    pub fn mark_recorded(&self, ctx: &RenderContext) -> Result<()> {
        let frame = ctx.require_surface_frame(SOURCE)?;
        let mut dirty = lock(&self.dirty, SOURCE)?;
        if let Some(slot) = dirty
            .get_mut(&frame.surface)
            .and_then(|slots| slots.get_mut(frame.active_index as usize))
        {
            *slot = false;
        }
        Ok(())
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut dirty) = self.dirty.lock() {
            for slots in dirty.values_mut() {
                slots.iter_mut().for_each(|slot| *slot = true);
            }
        }
    }
}

impl Node for CommandBufferSlots {
    fn accept(&self, visitor: &mut dyn NodeVisitor) {
        visitor.visit_command_slots(self);
    }

    fn invalidate_node(&self) {
        self.invalidate_all();
    }
}
