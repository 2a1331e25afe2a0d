/// Resource contract and the observer index used for invalidation fan-out

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use crate::context::RenderContext;
use crate::descriptor::Descriptor;
use crate::device::{DescriptorType, DescriptorValue};
use crate::error::Result;

/// Identifier of a descriptor registered with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObserverId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Back-references from a resource to the descriptors bound to it
///
/// Holds weak references only: descriptors own their resources, never the
/// other way round.
#[derive(Default)]
pub struct DescriptorObservers {
    entries: Mutex<Vec<(ObserverId, Weak<Descriptor>)>>,
}

impl DescriptorObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, id: ObserverId, descriptor: Weak<Descriptor>) {
        if let Ok(mut entries) = self.entries.lock() {
            if !entries.iter().any(|(existing, _)| *existing == id) {
                entries.push((id, descriptor));
            }
        }
    }

    pub(crate) fn unregister(&self, id: ObserverId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|(existing, _)| *existing != id);
        }
    }

    /// Live registered descriptors
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|(_, d)| d.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate every live descriptor
    ///
    /// The observer lock is released before descriptors are notified, so a
    /// descriptor set may re-enter this resource while handling it.
    pub fn notify(&self) {
        let live: Vec<Arc<Descriptor>> = match self.entries.lock() {
            Ok(mut entries) => {
                entries.retain(|(_, d)| d.strong_count() > 0);
                entries.iter().filter_map(|(_, d)| d.upgrade()).collect()
            }
            Err(_) => return,
        };
        for descriptor in live {
            descriptor.invalidate();
        }
    }
}

/// GPU-visible buffer or image that can be bound through a descriptor
pub trait Resource: Send + Sync {
    /// Type used by `DescriptorSet::set_descriptor_default`
    fn default_descriptor_type(&self) -> DescriptorType;

    /// Make sure the native object backing this resource exists for `ctx`
    fn validate(&self, ctx: &RenderContext) -> Result<()>;

    /// Snapshot written into descriptor sets; valid after `validate(ctx)`
    fn descriptor_value(&self, ctx: &RenderContext) -> Result<DescriptorValue>;

    fn observers(&self) -> &DescriptorObservers;

    /// Propagate a content change to every descriptor bound to this resource
    fn invalidate_descriptors(&self) {
        self.observers().notify();
    }
}
