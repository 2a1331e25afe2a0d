//! Unit tests for the descriptor graph

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use crate::context::{DeviceId, RenderContext, SurfaceFrame, SurfaceId};
use crate::descriptor::{
    DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding, GpuBuffer,
    Resource, SampledImage,
};
use crate::device::mock_device::{kind, MockGraphicsDevice};
use crate::device::{
    BufferUsage, DescriptorType, DescriptorValue, ImageLayout, NativeHandle, ShaderStageFlags,
};
use crate::error::Error;
use crate::node::{Node, NodeVisitor};
use crate::validation::Validatable;

const SURFACE: SurfaceId = SurfaceId(7);

fn frame_ctx(device: &Arc<MockGraphicsDevice>, slot: u32, count: u32) -> RenderContext {
    RenderContext::for_surface_frame(
        device.clone(),
        SurfaceFrame { surface: SURFACE, active_index: slot, frame_count: count },
    )
}

fn storage_layout() -> Arc<DescriptorSetLayout> {
    DescriptorSetLayout::new(vec![DescriptorSetLayoutBinding::new(
        0,
        1,
        DescriptorType::StorageBuffer,
        ShaderStageFlags::COMPUTE,
    )])
    .unwrap()
}

fn storage_set(capacity: u32) -> (Arc<DescriptorSet>, Arc<GpuBuffer<u32>>) {
    let layout = storage_layout();
    let pool = DescriptorPool::for_layout(capacity, &layout).unwrap();
    let set = DescriptorSet::new(layout, pool).unwrap();
    let buffer = GpuBuffer::storage(vec![1u32, 2, 3, 4], BufferUsage::empty());
    set.set_descriptor_default(0, vec![buffer.clone() as Arc<dyn Resource>]).unwrap();
    (set, buffer)
}

fn buffer_value(device: &MockGraphicsDevice, set: NativeHandle) -> (NativeHandle, u64) {
    let writes = device.writes(set);
    assert_eq!(writes.len(), 1);
    match writes[0].values[0] {
        DescriptorValue::Buffer { buffer, range, .. } => (buffer, range),
        other => panic!("expected a buffer value, got {:?}", other),
    }
}

#[derive(Default)]
struct CountingNode {
    invalidations: AtomicU32,
}

impl Node for CountingNode {
    fn accept(&self, _visitor: &mut dyn NodeVisitor) {}

    fn invalidate_node(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// CONSTRUCTION CONTRACT
// ============================================================================

#[test]
fn test_set_descriptor_rejects_type_mismatch() {
    let (set, buffer) = storage_set(3);
    let result = set.set_descriptor(0, vec![buffer as Arc<dyn Resource>], DescriptorType::UniformBuffer);
    assert!(matches!(result, Err(Error::ContractViolation(_))));
}

#[test]
fn test_set_descriptor_rejects_unknown_binding_and_overflow() {
    let (set, buffer) = storage_set(3);
    let resource = buffer as Arc<dyn Resource>;

    assert!(matches!(
        set.set_descriptor(5, vec![resource.clone()], DescriptorType::StorageBuffer),
        Err(Error::ContractViolation(_))
    ));
    assert!(matches!(
        set.set_descriptor(0, vec![resource.clone(), resource], DescriptorType::StorageBuffer),
        Err(Error::ContractViolation(_))
    ));
    assert!(matches!(
        set.set_descriptor(0, Vec::new(), DescriptorType::StorageBuffer),
        Err(Error::ContractViolation(_))
    ));
}

#[test]
fn test_pool_must_cover_layout_types() {
    let layout = storage_layout();
    let pool = DescriptorPool::new(
        2,
        vec![DescriptorSetLayoutBinding::new(0, 1, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX)],
    )
    .unwrap();
    assert!(matches!(DescriptorSet::new(layout, pool), Err(Error::ContractViolation(_))));
}

#[test]
fn test_layout_rejects_duplicate_bindings() {
    let binding = DescriptorSetLayoutBinding::new(0, 1, DescriptorType::StorageBuffer, ShaderStageFlags::COMPUTE);
    assert!(matches!(
        DescriptorSetLayout::new(vec![binding, binding]),
        Err(Error::ContractViolation(_))
    ));
    assert!(matches!(DescriptorSetLayout::new(Vec::new()), Err(Error::ContractViolation(_))));
}

#[test]
fn test_device_only_context_is_rejected() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    let ctx = RenderContext::for_device(device);
    assert!(matches!(set.validate(&ctx), Err(Error::ContractViolation(_))));
}

// ============================================================================
// IDEMPOTENT VALIDATION
// ============================================================================

#[test]
fn test_handle_before_validate_is_not_validated() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    assert!(matches!(set.handle(&frame_ctx(&device, 0, 3)), Err(Error::NotValidated(_))));
}

#[test]
fn test_validate_twice_builds_once() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    let ctx = frame_ctx(&device, 0, 3);

    set.validate(&ctx).unwrap();
    let first = set.handle(&ctx).unwrap();
    set.validate(&ctx).unwrap();

    assert_eq!(set.handle(&ctx).unwrap(), first);
    assert_eq!(set.build_count(SURFACE, 0), 1);
    assert_eq!(device.created(kind::DESCRIPTOR_SET), 1);
    assert_eq!(device.created(kind::SET_LAYOUT), 1);
    assert_eq!(device.created(kind::POOL), 1);
    assert_eq!(device.created(kind::BUFFER), 1);
}

#[test]
fn test_each_slot_gets_its_own_native_set() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);

    for slot in 0..3 {
        set.validate(&frame_ctx(&device, slot, 3)).unwrap();
    }

    let handles: Vec<_> = (0..3).map(|s| set.handle(&frame_ctx(&device, s, 3)).unwrap()).collect();
    assert_ne!(handles[0], handles[1]);
    assert_ne!(handles[1], handles[2]);
    assert_eq!(device.created(kind::DESCRIPTOR_SET), 3);
}

// ============================================================================
// INVALIDATION FAN-OUT
// ============================================================================

#[test]
fn test_resource_resize_invalidates_every_slot() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, buffer) = storage_set(3);
    let slot0 = frame_ctx(&device, 0, 2);
    let slot1 = frame_ctx(&device, 1, 2);
    set.validate(&slot0).unwrap();
    set.validate(&slot1).unwrap();
    let native = set.handle(&slot0).unwrap();
    let (old_buffer, old_range) = buffer_value(&device, native);

    buffer.set(vec![9u32; 32]).unwrap();

    assert!(!set.is_valid(SURFACE, 0));
    assert!(!set.is_valid(SURFACE, 1));

    set.validate(&slot0).unwrap();
    assert!(set.is_valid(SURFACE, 0));
    assert!(!set.is_valid(SURFACE, 1));

    // Rewritten in place with the new buffer range
    assert_eq!(set.handle(&slot0).unwrap(), native);
    let (new_buffer, new_range) = buffer_value(&device, native);
    assert_ne!(new_buffer, old_buffer);
    assert_eq!(old_range, 16);
    assert_eq!(new_range, 128);
    assert!(!device.is_live(old_buffer));
    assert_eq!(set.build_count(SURFACE, 0), 2);
}

#[test]
fn test_same_size_rewrite_invalidates_slots_and_nodes() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, buffer) = storage_set(3);
    let node = Arc::new(CountingNode::default());
    let as_node: Arc<dyn Node> = node.clone();
    set.add_node(&as_node);
    let slot0 = frame_ctx(&device, 0, 2);
    let slot1 = frame_ctx(&device, 1, 2);
    set.validate(&slot0).unwrap();
    set.validate(&slot1).unwrap();
    let native = set.handle(&slot0).unwrap();
    let old_buffer = buffer.handle(&slot0).unwrap();

    buffer.set(vec![9u32, 9, 9, 9]).unwrap();

    assert!(!set.is_valid(SURFACE, 0));
    assert!(!set.is_valid(SURFACE, 1));
    assert_eq!(node.invalidations.load(Ordering::SeqCst), 1);

    set.validate(&slot0).unwrap();
    // Same native buffer and set, new contents uploaded
    assert_eq!(set.handle(&slot0).unwrap(), native);
    assert_eq!(buffer.handle(&slot0).unwrap(), old_buffer);
    let bytes = device.buffer_contents(old_buffer).unwrap();
    assert_eq!(bytes.as_slice(), bytemuck::cast_slice::<u32, u8>(&[9, 9, 9, 9]));
    assert_eq!(device.created(kind::BUFFER), 1);
}

#[test]
fn test_layout_invalidate_keeps_native_layout() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    let ctx = frame_ctx(&device, 0, 3);
    set.validate(&ctx).unwrap();
    let layout = set.layout().handle(&ctx).unwrap();

    set.layout().invalidate();
    set.layout().validate(&ctx).unwrap();
    set.validate(&ctx).unwrap();

    assert_eq!(set.layout().handle(&ctx).unwrap(), layout);
    assert!(device.is_live(layout));
    assert_eq!(set.layout().build_count(DeviceId(1)), 1);
    assert_eq!(device.destroyed(kind::SET_LAYOUT), 0);
}

#[test]
fn test_invalidate_is_idempotent_and_keeps_handles() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    let ctx = frame_ctx(&device, 0, 3);
    set.validate(&ctx).unwrap();
    let native = set.handle(&ctx).unwrap();

    set.invalidate();
    set.invalidate();

    assert!(!set.is_valid(SURFACE, 0));
    assert!(device.is_live(native));
    assert_eq!(set.handle(&ctx).unwrap(), native);
}

#[test]
fn test_nodes_are_notified_on_resource_change() {
    let (set, buffer) = storage_set(3);
    let node = Arc::new(CountingNode::default());
    let as_node: Arc<dyn Node> = node.clone();
    set.add_node(&as_node);
    set.add_node(&as_node);
    assert_eq!(set.node_count(), 1);

    buffer.set(vec![0u32; 8]).unwrap();
    assert_eq!(node.invalidations.load(Ordering::SeqCst), 1);

    set.remove_node(&as_node);
    buffer.set(vec![0u32; 2]).unwrap();
    assert_eq!(node.invalidations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropped_node_is_forgotten() {
    let (set, _buffer) = storage_set(3);
    {
        let node: Arc<dyn Node> = Arc::new(CountingNode::default());
        set.add_node(&node);
        assert_eq!(set.node_count(), 1);
    }
    assert_eq!(set.node_count(), 0);
    set.invalidate();
}

#[test]
fn test_reset_descriptor_unregisters_resource() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, buffer) = storage_set(3);
    let ctx = frame_ctx(&device, 0, 3);
    set.validate(&ctx).unwrap();
    assert_eq!(buffer.observers().len(), 1);

    set.reset_descriptor(0).unwrap();

    assert!(buffer.observers().is_empty());
    assert!(!set.is_valid(SURFACE, 0));
    assert_eq!(set.descriptor_count(), 0);

    set.validate(&ctx).unwrap();
    assert!(device.writes(set.handle(&ctx).unwrap()).is_empty());
}

#[test]
fn test_replacing_descriptor_unregisters_previous_resource() {
    let (set, first) = storage_set(3);
    let second = GpuBuffer::storage(vec![0u32; 4], BufferUsage::empty());

    set.set_descriptor_default(0, vec![second.clone() as Arc<dyn Resource>]).unwrap();

    assert!(first.observers().is_empty());
    assert_eq!(second.observers().len(), 1);
}

// ============================================================================
// PER-SLOT ISOLATION
// ============================================================================

#[test]
fn test_invalidate_slot_leaves_other_slots_alone() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    for slot in 0..3 {
        set.validate(&frame_ctx(&device, slot, 3)).unwrap();
    }

    set.invalidate_slot(&frame_ctx(&device, 1, 3)).unwrap();

    assert!(set.is_valid(SURFACE, 0));
    assert!(!set.is_valid(SURFACE, 1));
    assert!(set.is_valid(SURFACE, 2));

    set.validate(&frame_ctx(&device, 1, 3)).unwrap();
    assert_eq!(set.build_count(SURFACE, 0), 1);
    assert_eq!(set.build_count(SURFACE, 1), 2);
    assert_eq!(set.build_count(SURFACE, 2), 1);
}

#[test]
fn test_frame_count_change_frees_dropped_slots() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(3);
    for slot in 0..3 {
        set.validate(&frame_ctx(&device, slot, 3)).unwrap();
    }

    set.validate(&frame_ctx(&device, 0, 2)).unwrap();

    assert_eq!(device.destroyed(kind::DESCRIPTOR_SET), 1);
    assert!(set.is_valid(SURFACE, 0));
    assert!(!set.is_valid(SURFACE, 1));
    assert!(!set.is_valid(SURFACE, 2));
}

// ============================================================================
// POOL CAPACITY
// ============================================================================

#[test]
fn test_pool_exhaustion_is_a_hard_error() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(2);

    set.validate(&frame_ctx(&device, 0, 3)).unwrap();
    set.validate(&frame_ctx(&device, 1, 3)).unwrap();
    let result = set.validate(&frame_ctx(&device, 2, 3));

    assert_eq!(result, Err(Error::PoolExhausted { capacity: 2 }));
    assert!(!set.is_valid(SURFACE, 2));
    assert_eq!(set.pool().allocated_count(DeviceId(1)), 2);
}

#[test]
fn test_drop_returns_sets_to_pool() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let (set, _buffer) = storage_set(2);
    let pool = set.pool().clone();
    set.validate(&frame_ctx(&device, 0, 2)).unwrap();
    set.validate(&frame_ctx(&device, 1, 2)).unwrap();

    drop(set);

    assert_eq!(pool.allocated_count(DeviceId(1)), 0);
    assert_eq!(device.destroyed(kind::DESCRIPTOR_SET), 2);
}

// ============================================================================
// SAMPLED IMAGE
// ============================================================================

#[test]
fn test_sampled_image_requires_a_view() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let image = SampledImage::new();
    let ctx = RenderContext::for_device(device);
    assert!(matches!(image.validate(&ctx), Err(Error::InvalidResource(_))));
}

#[test]
fn test_sampled_image_default_type_follows_sampler() {
    let image = SampledImage::new();
    image.set_view(DeviceId(1), NativeHandle(10), None, ImageLayout::ShaderReadOnly).unwrap();
    assert_eq!(image.default_descriptor_type(), DescriptorType::SampledImage);

    image
        .set_view(DeviceId(1), NativeHandle(10), Some(NativeHandle(11)), ImageLayout::ShaderReadOnly)
        .unwrap();
    assert_eq!(image.default_descriptor_type(), DescriptorType::CombinedImageSampler);
}

#[test]
fn test_sampled_image_view_change_rewrites_set() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let layout = DescriptorSetLayout::new(vec![DescriptorSetLayoutBinding::new(
        1,
        1,
        DescriptorType::CombinedImageSampler,
        ShaderStageFlags::FRAGMENT,
    )])
    .unwrap();
    let pool = DescriptorPool::for_layout(3, &layout).unwrap();
    let set = DescriptorSet::new(layout, pool).unwrap();
    let image = SampledImage::new();
    image
        .set_view(DeviceId(1), NativeHandle(10), Some(NativeHandle(11)), ImageLayout::ShaderReadOnly)
        .unwrap();
    set.set_descriptor_default(1, vec![image.clone() as Arc<dyn Resource>]).unwrap();

    let ctx = frame_ctx(&device, 0, 3);
    set.validate(&ctx).unwrap();
    image
        .set_view(DeviceId(1), NativeHandle(12), Some(NativeHandle(11)), ImageLayout::ShaderReadOnly)
        .unwrap();
    assert!(!set.is_valid(SURFACE, 0));

    set.validate(&ctx).unwrap();
    let writes = device.writes(set.handle(&ctx).unwrap());
    assert_eq!(
        writes[0].values[0],
        DescriptorValue::Image {
            sampler: Some(NativeHandle(11)),
            image_view: NativeHandle(12),
            layout: ImageLayout::ShaderReadOnly,
        }
    );
}
