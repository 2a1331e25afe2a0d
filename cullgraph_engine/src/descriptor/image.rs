/// SampledImage - externally created image view exposed as a resource

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::context::{DeviceId, RenderContext};
use crate::descriptor::{DescriptorObservers, Resource};
use crate::device::{DescriptorType, DescriptorValue, ImageLayout, NativeHandle};
use crate::engine_raise;
use crate::error::{Error, Result};
use crate::validation::lock;

const SOURCE: &str = "cullgraph::SampledImage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ImageBinding {
    image_view: NativeHandle,
    sampler: Option<NativeHandle>,
    layout: ImageLayout,
}

/// Image view (and optional sampler) per device
///
/// Textures are loaded by the asset system, which hands the native views
/// over through `set_view`. Changing a view re-writes every descriptor set
/// the image is bound in.
pub struct SampledImage {
    observers: DescriptorObservers,
    views: Mutex<FxHashMap<DeviceId, ImageBinding>>,
}

impl SampledImage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            observers: DescriptorObservers::new(),
            views: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn set_view(
        &self,
        device: DeviceId,
        image_view: NativeHandle,
        sampler: Option<NativeHandle>,
        layout: ImageLayout,
    ) -> Result<()> {
        let binding = ImageBinding { image_view, sampler, layout };
        let changed = lock(&self.views, SOURCE)?.insert(device, binding) != Some(binding);
        if changed {
            self.invalidate_descriptors();
        }
        Ok(())
    }

    pub fn remove_view(&self, device: DeviceId) -> Result<()> {
        if lock(&self.views, SOURCE)?.remove(&device).is_some() {
            self.invalidate_descriptors();
        }
        Ok(())
    }

    fn binding(&self, device: DeviceId) -> Result<ImageBinding> {
        lock(&self.views, SOURCE)?.get(&device).copied().ok_or_else(|| engine_raise!(
            SOURCE,
            Error::InvalidResource(format!("no image view for device {}", device.0))
        ))
    }
}

impl Resource for SampledImage {
    /// Combined image sampler when any device has a sampler, sampled image otherwise
    fn default_descriptor_type(&self) -> DescriptorType {
        let has_sampler = self
            .views
            .lock()
            .map(|views| views.values().any(|b| b.sampler.is_some()))
            .unwrap_or(false);
        if has_sampler {
            DescriptorType::CombinedImageSampler
        } else {
            DescriptorType::SampledImage
        }
    }

    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        self.binding(ctx.device_id()).map(|_| ())
    }

    fn descriptor_value(&self, ctx: &RenderContext) -> Result<DescriptorValue> {
        let binding = self.binding(ctx.device_id())?;
        Ok(DescriptorValue::Image {
            sampler: binding.sampler,
            image_view: binding.image_view,
            layout: binding.layout,
        })
    }

    fn observers(&self) -> &DescriptorObservers {
        &self.observers
    }
}
