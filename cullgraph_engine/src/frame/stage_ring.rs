/// StageRing - triple-buffered handoff from the update stage to the render stage

use std::sync::{Mutex, MutexGuard};
use crate::error::Result;
use crate::validation::lock;

const SOURCE: &str = "cullgraph::StageRing";

#[derive(Debug, Clone, Copy)]
struct RingIndices {
    update: usize,
    render: usize,
    /// Published by the update stage, not yet picked up by the render stage
    ready: Option<usize>,
}

/// Three slots of `T`: one being written, one being read, one spare
///
/// The update and render slots are always distinct, so each stage only ever
/// locks its own slot. Publishing a new update before the render stage
/// picked up the previous one overwrites it.
pub struct StageRing<T> {
    slots: [Mutex<T>; 3],
    indices: Mutex<RingIndices>,
}

impl<T: Clone> StageRing<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: [
                Mutex::new(initial.clone()),
                Mutex::new(initial.clone()),
                Mutex::new(initial),
            ],
            indices: Mutex::new(RingIndices { update: 0, render: 1, ready: None }),
        }
    }
}

impl<T> StageRing<T> {
    pub fn update_index(&self) -> usize {
        self.indices.lock().map(|i| i.update).unwrap_or(0)
    }

    pub fn render_index(&self) -> usize {
        self.indices.lock().map(|i| i.render).unwrap_or(1)
    }

    /// Slot the update stage writes into
    pub fn update_slot(&self) -> Result<MutexGuard<'_, T>> {
        let index = lock(&self.indices, SOURCE)?.update;
        lock(&self.slots[index], SOURCE)
    }

    /// Slot the render stage reads from
    pub fn render_slot(&self) -> Result<MutexGuard<'_, T>> {
        let index = lock(&self.indices, SOURCE)?.render;
        lock(&self.slots[index], SOURCE)
    }

    /// Hand the update slot to the render stage and move on to the spare slot
    pub fn publish(&self) -> Result<()> {
        let mut indices = lock(&self.indices, SOURCE)?;
        let published = indices.update;
        indices.update = spare(published, indices.render);
        indices.ready = Some(published);
        Ok(())
    }

    /// Switch the render stage to the most recently published slot
    ///
    /// Returns false (and keeps the current slot) when nothing new was published.
    pub fn acquire(&self) -> Result<bool> {
        let mut indices = lock(&self.indices, SOURCE)?;
        match indices.ready.take() {
            Some(ready) => {
                indices.render = ready;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The one index in 0..3 that is neither `a` nor `b`
fn spare(a: usize, b: usize) -> usize {
    3 - a - b
}

#[cfg(test)]
#[path = "stage_ring_tests.rs"]
mod tests;
