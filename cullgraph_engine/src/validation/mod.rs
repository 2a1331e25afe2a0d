//! Validatable resources
//!
//! Every cacheable object keeps a per-context map of native handles and
//! exposes the same two entry points: `validate(ctx)` lazily (re)builds the
//! handle for that context when it is absent or marked invalid, and
//! `invalidate()` marks handles for rebuild without destroying them.

pub mod per_device;
pub mod per_surface;

pub use per_device::{CacheEntry, PerDeviceCache};
pub use per_surface::PerSurfaceCache;

use std::sync::{Mutex, MutexGuard};
use crate::context::RenderContext;
use crate::error::Result;

/// Lazily built native object
pub trait Validatable: Send + Sync {
    /// Ensure the native handle for `ctx` exists and is current
    ///
    /// Idempotent: a second call with nothing changed performs no GPU work.
    fn validate(&self, ctx: &RenderContext) -> Result<()>;

    /// Mark every cached handle for rebuild
    fn invalidate(&self);
}

/// Lock an object's state, turning poisoning into a backend error
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, source: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| crate::engine_err!(source, "state lock poisoned"))
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
