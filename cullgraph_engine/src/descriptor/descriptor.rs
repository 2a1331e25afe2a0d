/// Descriptor - typed binding of resources to one slot of a set

use std::sync::{Arc, Weak};
use crate::context::RenderContext;
use crate::descriptor::{DescriptorSet, ObserverId, Resource};
use crate::device::{DescriptorType, DescriptorWrite};
use crate::error::Result;

/// Binding slot → resources, owned by one descriptor set
///
/// Registers itself with each of its resources on creation and unregisters
/// when replaced, reset or dropped.
pub struct Descriptor {
    id: ObserverId,
    binding: u32,
    descriptor_type: DescriptorType,
    resources: Vec<Arc<dyn Resource>>,
    owner: Weak<DescriptorSet>,
}

impl Descriptor {
    pub(crate) fn new(
        owner: Weak<DescriptorSet>,
        binding: u32,
        resources: Vec<Arc<dyn Resource>>,
        descriptor_type: DescriptorType,
    ) -> Arc<Self> {
        let descriptor = Arc::new(Self {
            id: ObserverId::next(),
            binding,
            descriptor_type,
            resources,
            owner,
        });
        for resource in &descriptor.resources {
            resource.observers().register(descriptor.id, Arc::downgrade(&descriptor));
        }
        descriptor
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.resources
    }

    pub(crate) fn unregister(&self) {
        for resource in &self.resources {
            resource.observers().unregister(self.id);
        }
    }

    /// A resource changed: invalidate the owning set (if it is still alive)
    pub fn invalidate(&self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.invalidate();
        }
    }

    pub fn validate(&self, ctx: &RenderContext) -> Result<()> {
        for resource in &self.resources {
            resource.validate(ctx)?;
        }
        Ok(())
    }

    /// Resolved values of every resource, in binding array order
    pub fn write(&self, ctx: &RenderContext) -> Result<DescriptorWrite> {
        let values = self
            .resources
            .iter()
            .map(|r| r.descriptor_value(ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(DescriptorWrite {
            binding: self.binding,
            descriptor_type: self.descriptor_type,
            values,
        })
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        self.unregister();
    }
}
