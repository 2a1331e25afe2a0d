//! Unit tests for the per-device and per-surface caches

use std::sync::Arc;
use crate::context::{DeviceId, RenderContext, SurfaceFrame, SurfaceId};
use crate::device::mock_device::{kind, MockGraphicsDevice};
use crate::device::{GraphicsDevice, NativeHandle};
use crate::error::Error;
use crate::validation::{PerDeviceCache, PerSurfaceCache};

fn build_cache(device: &dyn GraphicsDevice) -> crate::error::Result<NativeHandle> {
    device.create_pipeline_cache(&[])
}

fn destroy_cache(device: &dyn GraphicsDevice, handle: NativeHandle) {
    device.destroy_pipeline_cache(handle)
}

fn surface_ctx(device: &Arc<MockGraphicsDevice>, slot: u32, count: u32) -> RenderContext {
    RenderContext::for_surface_frame(
        device.clone(),
        SurfaceFrame { surface: SurfaceId(1), active_index: slot, frame_count: count },
    )
}

// ============================================================================
// PER-DEVICE CACHE
// ============================================================================

#[test]
fn test_handle_before_validate_is_not_validated() {
    let cache: PerDeviceCache<NativeHandle> = PerDeviceCache::new();
    assert!(matches!(cache.handle(DeviceId(1), "cache"), Err(Error::NotValidated(_))));
}

#[test]
fn test_validate_is_idempotent() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let ctx = RenderContext::for_device(device.clone());
    let mut cache = PerDeviceCache::new();

    let first = cache.validate_with(&ctx, build_cache, destroy_cache).unwrap();
    let second = cache.validate_with(&ctx, build_cache, destroy_cache).unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.build_count(DeviceId(1)), 1);
    assert_eq!(device.created(kind::PIPELINE_CACHE), 1);
}

#[test]
fn test_invalidate_defers_destruction_until_replacement() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let ctx = RenderContext::for_device(device.clone());
    let mut cache = PerDeviceCache::new();

    let old = cache.validate_with(&ctx, build_cache, destroy_cache).unwrap();
    cache.invalidate_all();

    assert!(!cache.is_valid(DeviceId(1)));
    assert!(device.is_live(old));
    assert_eq!(cache.handle(DeviceId(1), "cache").unwrap(), old);

    let new = cache.validate_with(&ctx, build_cache, destroy_cache).unwrap();
    assert_ne!(old, new);
    assert!(!device.is_live(old));
    assert!(device.is_live(new));
    assert_eq!(cache.build_count(DeviceId(1)), 2);
}

#[test]
fn test_failed_rebuild_keeps_old_handle() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let ctx = RenderContext::for_device(device.clone());
    let mut cache = PerDeviceCache::new();

    let old = cache.validate_with(&ctx, build_cache, destroy_cache).unwrap();
    cache.invalidate(DeviceId(1));
    device.fail_next(Error::OutOfMemory);

    assert_eq!(cache.validate_with(&ctx, build_cache, destroy_cache), Err(Error::OutOfMemory));
    assert!(device.is_live(old));
    assert!(!cache.is_valid(DeviceId(1)));
}

#[test]
fn test_devices_are_independent() {
    let a = Arc::new(MockGraphicsDevice::new(1));
    let b = Arc::new(MockGraphicsDevice::new(2));
    let mut cache = PerDeviceCache::new();

    cache.validate_with(&RenderContext::for_device(a.clone()), build_cache, destroy_cache).unwrap();
    assert!(cache.is_valid(DeviceId(1)));
    assert!(!cache.is_valid(DeviceId(2)));

    cache.validate_with(&RenderContext::for_device(b.clone()), build_cache, destroy_cache).unwrap();
    cache.invalidate(DeviceId(1));
    assert!(cache.is_valid(DeviceId(2)));

    cache.clear(destroy_cache);
    assert_eq!(a.destroyed(kind::PIPELINE_CACHE), 1);
    assert_eq!(b.destroyed(kind::PIPELINE_CACHE), 1);
}

// ============================================================================
// PER-SURFACE CACHE
// ============================================================================

#[test]
fn test_surface_cache_requires_surface_context() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut cache = PerSurfaceCache::new();
    let result = cache.validate_with(
        &RenderContext::for_device(device),
        "cullgraph::test",
        |d, _| build_cache(d),
        destroy_cache,
    );
    assert!(matches!(result, Err(Error::ContractViolation(_))));
}

#[test]
fn test_surface_slots_are_isolated() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut cache = PerSurfaceCache::new();

    let h0 = cache.validate_with(&surface_ctx(&device, 0, 2), "t", |d, _| build_cache(d), destroy_cache).unwrap();
    let h1 = cache.validate_with(&surface_ctx(&device, 1, 2), "t", |d, _| build_cache(d), destroy_cache).unwrap();
    assert_ne!(h0, h1);

    cache.invalidate_slot(SurfaceId(1), 0);
    assert!(!cache.is_valid(SurfaceId(1), 0));
    assert!(cache.is_valid(SurfaceId(1), 1));
    assert_eq!(cache.build_count(SurfaceId(1), 1), 1);
}

#[test]
fn test_frame_count_change_invalidates_and_trims() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut cache = PerSurfaceCache::new();

    for slot in 0..3 {
        cache.validate_with(&surface_ctx(&device, slot, 3), "t", |d, _| build_cache(d), destroy_cache).unwrap();
    }
    assert_eq!(cache.slot_count(SurfaceId(1)), 3);

    cache.validate_with(&surface_ctx(&device, 0, 2), "t", |d, _| build_cache(d), destroy_cache).unwrap();
    assert_eq!(cache.slot_count(SurfaceId(1)), 2);
    assert!(cache.is_valid(SurfaceId(1), 0));
    assert!(!cache.is_valid(SurfaceId(1), 1));
    // slot 2 dropped, slot 0 rebuilt
    assert_eq!(device.destroyed(kind::PIPELINE_CACHE), 2);
}

#[test]
fn test_active_index_outside_frame_count_is_rejected() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut cache = PerSurfaceCache::new();
    let result = cache.validate_with(&surface_ctx(&device, 2, 2), "t", |d, _| build_cache(d), destroy_cache);
    assert!(matches!(result, Err(Error::ContractViolation(_))));
}

#[test]
fn test_build_receives_previous_handle_for_reuse() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut cache = PerSurfaceCache::new();
    let ctx = surface_ctx(&device, 0, 2);

    let first = cache.validate_with(&ctx, "t", |d, _| build_cache(d), destroy_cache).unwrap();
    cache.invalidate_all();
    let reused = cache
        .validate_with(&ctx, "t", |_, previous| Ok(previous.unwrap()), destroy_cache)
        .unwrap();

    assert_eq!(first, reused);
    assert!(device.is_live(first));
    assert_eq!(cache.build_count(SurfaceId(1), 0), 2);
}

// ============================================================================
// CONCURRENT VALIDATION
// ============================================================================

#[test]
fn test_concurrent_validate_builds_once_per_device() {
    use crate::descriptor::{DescriptorSetLayout, DescriptorSetLayoutBinding};
    use crate::device::{DescriptorType, ShaderStageFlags};
    use crate::pipeline::{GraphicsPipeline, PipelineCache, PipelineLayout, ShaderModule, ShaderStageDefinition};
    use crate::validation::Validatable;

    let set_layout = DescriptorSetLayout::new(vec![DescriptorSetLayoutBinding::new(
        0,
        1,
        DescriptorType::StorageBuffer,
        ShaderStageFlags::VERTEX,
    )])
    .unwrap();
    let pipeline = GraphicsPipeline::new(PipelineCache::new(), PipelineLayout::new(vec![set_layout], Vec::new()));
    let module = ShaderModule::new("shader", vec![0u8; 16]).unwrap();
    pipeline
        .set_shader_stages(vec![
            ShaderStageDefinition::new(ShaderStageFlags::VERTEX, module.clone()),
            ShaderStageDefinition::new(ShaderStageFlags::FRAGMENT, module),
        ])
        .unwrap();

    let first = Arc::new(MockGraphicsDevice::new(1));
    let second = Arc::new(MockGraphicsDevice::new(2));
    let contexts = [
        RenderContext::for_device(first.clone()),
        RenderContext::for_device(second.clone()),
        surface_ctx(&first, 0, 2),
        surface_ctx(&second, 1, 2),
    ];

    std::thread::scope(|scope| {
        for ctx in &contexts {
            let pipeline = &pipeline;
            scope.spawn(move || {
                for _ in 0..50 {
                    pipeline.validate(ctx).unwrap();
                }
            });
        }
    });

    for device in [&first, &second] {
        assert_eq!(device.created(kind::GRAPHICS_PIPELINE), 1);
        assert_eq!(device.created(kind::PIPELINE_LAYOUT), 1);
        assert_eq!(device.created(kind::SET_LAYOUT), 1);
        assert_eq!(device.created(kind::SHADER), 1);
        assert_eq!(device.destroyed(kind::GRAPHICS_PIPELINE), 0);
    }
    assert_eq!(pipeline.build_count(DeviceId(1)), 1);
    assert_eq!(pipeline.build_count(DeviceId(2)), 1);
    assert_ne!(pipeline.handle(&contexts[0]).unwrap(), pipeline.handle(&contexts[1]).unwrap());
}
