//! Unit tests for a culling category driven through surface frames on the mock device

use std::sync::Arc;
use glam::Mat4;
use serial_test::serial;
use crate::context::{RenderContext, SurfaceId};
use crate::cull::{
    CullCategory, CullFrameRecorder, DrawIndexedIndirectCommand, DrawRecordRegistry, GeometryBuffers,
    GeometryRange,
};
use crate::descriptor::{DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding, Resource};
use crate::device::mock_device::{kind, MockCommandList, MockGraphicsDevice, RecordedCommand};
use crate::device::{CommandList, DescriptorType, DescriptorValue, DynamicState, GraphicsDevice, ShaderStageFlags};
use crate::engine::Engine;
use crate::error::Error;
use crate::frame::{StaticInstance, SurfaceFrames};
use crate::pipeline::{
    ComputePipeline, GraphicsPipeline, PipelineCache, PipelineLayout, ShaderModule, ShaderStageDefinition,
};

fn forest() -> DrawRecordRegistry {
    let mut registry = DrawRecordRegistry::new();
    let ground = registry.register_type("ground", 100.0).unwrap();
    let tree = registry.register_type("tree", 5.0).unwrap();
    registry.register_lod(ground, 0.0, 1000.0, vec![GeometryRange::new(6, 0, 0)]).unwrap();
    registry
        .register_lod(tree, 0.0, 100.0, vec![GeometryRange::new(300, 6, 4), GeometryRange::new(30, 306, 4)])
        .unwrap();
    registry.register_lod(tree, 100.0, 500.0, vec![GeometryRange::new(90, 336, 120)]).unwrap();
    registry
}

fn category() -> CullCategory<StaticInstance> {
    let geometry = GeometryBuffers::new(vec![0.0; 64], (0..426).collect());
    CullCategory::new("static", &forest(), geometry).unwrap()
}

fn instance(type_id: u32) -> StaticInstance {
    StaticInstance::new(Mat4::IDENTITY, type_id, 0, 1.0)
}

fn storage_set(stages: ShaderStageFlags, resources: Vec<Arc<dyn Resource>>) -> Arc<DescriptorSet> {
    let bindings = (0..resources.len() as u32)
        .map(|binding| DescriptorSetLayoutBinding::new(binding, 1, DescriptorType::StorageBuffer, stages))
        .collect();
    let layout = DescriptorSetLayout::new(bindings).unwrap();
    let pool = DescriptorPool::for_layout(3, &layout).unwrap();
    let set = DescriptorSet::new(layout, pool).unwrap();
    for (binding, resource) in resources.into_iter().enumerate() {
        set.set_descriptor_default(binding as u32, vec![resource]).unwrap();
    }
    set
}

fn module() -> Arc<ShaderModule> {
    ShaderModule::new("shader", vec![0u8; 16]).unwrap()
}

/// Filter and render pipelines wired to the category's own buffers
fn bind(category: &CullCategory<StaticInstance>) {
    let cache = PipelineCache::new();

    let filter_set = storage_set(
        ShaderStageFlags::COMPUTE,
        vec![
            category.type_table(),
            category.lod_table(),
            category.instances(),
            category.results(),
            category.instance_indices(),
        ],
    );
    let filter_layout = PipelineLayout::new(vec![filter_set.layout().clone()], Vec::new());
    let filter = ComputePipeline::new(
        cache.clone(),
        filter_layout,
        ShaderStageDefinition::new(ShaderStageFlags::COMPUTE, module()),
    )
    .unwrap();
    category.set_filter(filter, filter_set).unwrap();

    let render_set = storage_set(
        ShaderStageFlags::VERTEX,
        vec![category.instances(), category.instance_indices()],
    );
    let render_layout = PipelineLayout::new(vec![render_set.layout().clone()], Vec::new());
    let render = GraphicsPipeline::new(cache, render_layout);
    render
        .set_shader_stages(vec![
            ShaderStageDefinition::new(ShaderStageFlags::VERTEX, module()),
            ShaderStageDefinition::new(ShaderStageFlags::FRAGMENT, module()),
        ])
        .unwrap();
    render.set_dynamic_states(vec![DynamicState::Viewport, DynamicState::Scissor]).unwrap();
    category.set_render(render, render_set).unwrap();
}

fn frames(device: &Arc<MockGraphicsDevice>) -> SurfaceFrames {
    let device: Arc<dyn GraphicsDevice> = device.clone();
    SurfaceFrames::new(SurfaceId(1), device, 3).unwrap()
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_category_without_records_is_rejected() {
    let geometry = GeometryBuffers::new(vec![0.0; 4], vec![0, 1, 2]);
    let result = CullCategory::<StaticInstance>::new("empty", &DrawRecordRegistry::new(), geometry);
    assert!(matches!(result, Err(Error::ContractViolation(_))));
}

#[test]
fn test_both_buffers_start_from_the_base_commands() {
    let category = category();
    assert_eq!(category.record_count(), 4);
    assert_eq!(category.results().get(), forest().base_commands());
    assert_eq!(category.indirect().get(), forest().base_commands());
    assert_eq!(category.geom_to_type(), &[0, 1, 1, 1]);
}

// ============================================================================
// PREPARE
// ============================================================================

#[test]
fn test_prepare_resets_instance_counts_and_places_first_instances() {
    let category = category();
    let offsets = category.prepare(vec![instance(1), instance(0), instance(1)]).unwrap();

    assert_eq!(offsets.first_instance, vec![0, 1, 3, 5]);
    assert_eq!(offsets.total, 7);

    let results = category.results().get();
    assert!(results.iter().all(|c| c.instance_count == 0));
    assert_eq!(results.iter().map(|c| c.first_instance).collect::<Vec<_>>(), vec![0, 1, 3, 5]);
    assert_eq!(results[1].index_count, 300);
    assert_eq!(category.instance_indices().len(), 7);
    assert_eq!(category.instances().len(), 3);
    assert_eq!(category.offsets(), Some(offsets));
}

#[test]
fn test_prepare_leaves_buffer_b_alone() {
    let category = category();
    category.prepare(vec![instance(1); 10]).unwrap();
    assert!(category.indirect().get().iter().all(|c| c.first_instance == 0));
}

#[test]
fn test_prepare_rejects_unknown_type() {
    let category = category();
    let result = category.prepare(vec![instance(0), instance(9)]);
    assert!(matches!(result, Err(Error::ContractViolation(_))));
    assert_eq!(category.offsets(), None);
}

#[test]
fn test_prepare_with_no_instances() {
    let category = category();
    let offsets = category.prepare(Vec::new()).unwrap();
    assert_eq!(offsets.total, 0);
    assert_eq!(offsets.first_instance, vec![0; 4]);
    assert!(category.instance_indices().is_empty());
}

// ============================================================================
// VALIDATE
// ============================================================================

#[test]
fn test_validate_without_pipelines_is_a_contract_violation() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut frames = frames(&device);
    let ctx = frames.begin_frame(0).unwrap();
    let category = category();
    category.prepare(vec![instance(0)]).unwrap();

    assert!(matches!(category.validate(&ctx), Err(Error::ContractViolation(_))));
}

#[test]
fn test_validate_outside_a_frame_fails() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let category = category();
    bind(&category);
    category.prepare(vec![instance(0)]).unwrap();

    assert!(category.validate(&RenderContext::for_device(device)).is_err());
}

#[test]
fn test_validate_collects_frame_handles() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut frames = frames(&device);
    let category = category();
    bind(&category);
    category.prepare(vec![instance(1), instance(0), instance(1)]).unwrap();

    let ctx = frames.begin_frame(0).unwrap();
    let frame = category.validate(&ctx).unwrap();

    assert_ne!(frame.results, frame.indirect);
    assert_eq!(frame.results, category.results().handle(&ctx).unwrap());
    assert_eq!(frame.command_bytes, 4 * u64::from(DrawIndexedIndirectCommand::STRIDE));
    assert_eq!(frame.instance_count, 3);
    assert_eq!(frame.draw_count, 4);
    assert!(frame.dynamic_viewport && frame.dynamic_scissor);
    assert_eq!(device.created(kind::COMPUTE_PIPELINE), 1);
    assert_eq!(device.created(kind::GRAPHICS_PIPELINE), 1);
    assert_eq!(device.created(kind::DESCRIPTOR_SET), 2);

    let uploaded = device.buffer_contents(frame.results).unwrap();
    let expected = category.results().get();
    assert_eq!(uploaded.as_slice(), bytemuck::cast_slice::<DrawIndexedIndirectCommand, u8>(&expected));
}

#[test]
fn test_each_frame_slot_gets_its_own_sets() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut frames = frames(&device);
    let category = category();
    bind(&category);
    category.prepare(vec![instance(0)]).unwrap();

    let first = category.validate(&frames.begin_frame(0).unwrap()).unwrap();
    frames.end_frame().unwrap();
    let second = category.validate(&frames.begin_frame(1).unwrap()).unwrap();
    frames.end_frame().unwrap();

    assert_ne!(first.filter_set, second.filter_set);
    assert_ne!(first.render_set, second.render_set);
    assert_eq!(first.filter_pipeline, second.filter_pipeline);
    assert_eq!(first.results, second.results);
    assert_eq!(device.created(kind::DESCRIPTOR_SET), 4);
}

#[test]
fn test_growing_instance_count_rewrites_sets_in_place() {
    let device = Arc::new(MockGraphicsDevice::new(1));
    let mut frames = frames(&device);
    let category = category();
    bind(&category);

    category.prepare(vec![instance(0)]).unwrap();
    let before = category.validate(&frames.begin_frame(0).unwrap()).unwrap();
    frames.end_frame().unwrap();

    category.prepare(vec![instance(1); 40]).unwrap();
    let ctx = frames.begin_frame(0).unwrap();
    let after = category.validate(&ctx).unwrap();
    frames.end_frame().unwrap();

    assert_eq!(before.filter_set, after.filter_set);
    assert_eq!(after.instance_count, 40);
    assert_eq!(after.draw_count, before.draw_count);
    assert_eq!(device.created(kind::DESCRIPTOR_SET), 2);
    let instances_write = device
        .writes(after.filter_set)
        .into_iter()
        .find(|w| w.binding == 2)
        .unwrap();
    assert_eq!(
        instances_write.values[0],
        DescriptorValue::Buffer { buffer: category.instances().handle(&ctx).unwrap(), offset: 0, range: 40 * 96 }
    );
}

// ============================================================================
// FULL FRAME
// ============================================================================

#[test]
#[serial]
fn test_validated_frame_records_filter_copy_and_draw() {
    Engine::reset_for_testing();
    let device = Arc::new(MockGraphicsDevice::new(1));
    let recorder = CullFrameRecorder::new(device.features());
    let mut frames = frames(&device);
    let category = category();
    bind(&category);
    category.prepare(vec![instance(1); 20]).unwrap();

    let frame = category.validate(&frames.begin_frame(2).unwrap()).unwrap();
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    recorder.record_compute(&mut cmd, &[frame]).unwrap();
    recorder
        .record_draw(
            &mut cmd,
            &[frame],
            crate::device::Viewport { x: 0.0, y: 0.0, width: 64.0, height: 64.0, min_depth: 0.0, max_depth: 1.0 },
            crate::device::Rect2D { x: 0, y: 0, width: 64, height: 64 },
        )
        .unwrap();
    cmd.end().unwrap();
    frames.end_frame().unwrap();

    assert!(cmd.commands.contains(&RecordedCommand::Dispatch(2, 1, 1)));
    assert!(cmd.commands.contains(&RecordedCommand::DrawIndexedIndirect {
        buffer: frame.indirect,
        offset: 0,
        draw_count: 4,
        stride: DrawIndexedIndirectCommand::STRIDE,
    }));
}
