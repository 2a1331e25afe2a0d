/// GpuBuffer - typed host-visible buffer bound through descriptors

use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use rustc_hash::FxHashMap;
use crate::context::{DeviceId, RenderContext};
use crate::descriptor::{DescriptorObservers, Resource};
use crate::device::{BufferUsage, DescriptorType, DescriptorValue, DeviceBuffer, NativeHandle};
use crate::error::{Error, Result};
use crate::validation::lock;
use crate::{engine_debug, engine_raise};

const SOURCE: &str = "cullgraph::GpuBuffer";

/// Native buffers are never created smaller than this
const MIN_BUFFER_SIZE: u64 = 16;

struct DeviceEntry {
    buffer: Arc<dyn DeviceBuffer>,
    dirty: bool,
}

struct BufferState<T> {
    data: Vec<T>,
    devices: FxHashMap<DeviceId, DeviceEntry>,
}

/// CPU-side array of `T` mirrored into one native buffer per device
///
/// `set` marks every device copy dirty; `validate` uploads it. A change of
/// byte size recreates the native buffer, which changes the descriptor value
/// and therefore invalidates every descriptor set the buffer is bound in.
pub struct GpuBuffer<T: Pod> {
    usage: BufferUsage,
    descriptor_type: DescriptorType,
    observers: DescriptorObservers,
    state: Mutex<BufferState<T>>,
}

impl<T: Pod + Send + Sync> GpuBuffer<T> {
    pub fn new(data: Vec<T>, usage: BufferUsage, descriptor_type: DescriptorType) -> Arc<Self> {
        Arc::new(Self {
            usage,
            descriptor_type,
            observers: DescriptorObservers::new(),
            state: Mutex::new(BufferState {
                data,
                devices: FxHashMap::default(),
            }),
        })
    }

    /// Storage buffer; `extra_usage` adds transfer/indirect/vertex usage
    pub fn storage(data: Vec<T>, extra_usage: BufferUsage) -> Arc<Self> {
        Self::new(data, BufferUsage::STORAGE | extra_usage, DescriptorType::StorageBuffer)
    }

    /// Uniform buffer holding a single value
    pub fn uniform(value: T) -> Arc<Self> {
        Self::new(vec![value], BufferUsage::UNIFORM, DescriptorType::UniformBuffer)
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Copy of the CPU-side contents
    pub fn get(&self) -> Vec<T> {
        lock(&self.state, SOURCE).map(|s| s.data.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.state, SOURCE).map(|s| s.data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the contents
    ///
    /// Every descriptor set referencing the buffer is invalidated, resized or
    /// not, so dependent nodes re-record before the next frame reads it.
    pub fn set(&self, data: Vec<T>) -> Result<()> {
        {
            let mut state = lock(&self.state, SOURCE)?;
            state.data = data;
            for entry in state.devices.values_mut() {
                entry.dirty = true;
            }
        }
        self.invalidate_descriptors();
        Ok(())
    }

    /// Resize to `len` zeroed elements; a no-op when the length already matches
    ///
    /// Used for buffers only the GPU writes into.
    pub fn resize(&self, len: usize) -> Result<()> {
        if self.len() == len {
            return Ok(());
        }
        self.set(vec![<T as bytemuck::Zeroable>::zeroed(); len])
    }

    fn byte_size(len: usize) -> u64 {
        ((len * std::mem::size_of::<T>()) as u64).max(MIN_BUFFER_SIZE)
    }

    /// Native buffer for the context's device; valid after `validate(ctx)`
    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        let state = lock(&self.state, SOURCE)?;
        state
            .devices
            .get(&ctx.device_id())
            .map(|entry| entry.buffer.handle())
            .ok_or_else(|| engine_raise!(
                SOURCE,
                Error::NotValidated(format!("GpuBuffer on device {}", ctx.device_id().0))
            ))
    }

    /// Size in bytes of the native buffer for the context's device
    pub fn size(&self, ctx: &RenderContext) -> Result<u64> {
        let state = lock(&self.state, SOURCE)?;
        state
            .devices
            .get(&ctx.device_id())
            .map(|entry| entry.buffer.size())
            .ok_or_else(|| engine_raise!(
                SOURCE,
                Error::NotValidated(format!("GpuBuffer on device {}", ctx.device_id().0))
            ))
    }
}

impl<T: Pod + Send + Sync> Resource for GpuBuffer<T> {
    fn default_descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        let replaced = {
            let mut state = lock(&self.state, SOURCE)?;
            let BufferState { data, devices } = &mut *state;
            let size = Self::byte_size(data.len());

            let mut replaced = false;
            let needs_buffer = devices
                .get(&ctx.device_id())
                .map(|entry| entry.buffer.size() != size)
                .unwrap_or(true);
            if needs_buffer {
                let buffer = ctx.device().create_buffer(size, self.usage)?;
                engine_debug!(SOURCE, "created {:?} ({} bytes) on device {}",
                    buffer.handle(), size, ctx.device_id().0);
                replaced = devices
                    .insert(ctx.device_id(), DeviceEntry { buffer, dirty: true })
                    .is_some();
            }

            if let Some(entry) = devices.get_mut(&ctx.device_id()) {
                if entry.dirty {
                    entry.buffer.write(0, bytemuck::cast_slice::<T, u8>(data.as_slice()))?;
                    entry.dirty = false;
                }
            }
            replaced
        };
        if replaced {
            self.invalidate_descriptors();
        }
        Ok(())
    }

    fn descriptor_value(&self, ctx: &RenderContext) -> Result<DescriptorValue> {
        let state = lock(&self.state, SOURCE)?;
        let entry = state.devices.get(&ctx.device_id()).ok_or_else(|| engine_raise!(
            SOURCE,
            Error::NotValidated(format!("GpuBuffer on device {}", ctx.device_id().0))
        ))?;
        Ok(DescriptorValue::Buffer {
            buffer: entry.buffer.handle(),
            offset: 0,
            range: entry.buffer.size(),
        })
    }

    fn observers(&self) -> &DescriptorObservers {
        &self.observers
    }
}
