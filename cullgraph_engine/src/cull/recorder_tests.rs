//! Unit tests for the culling command sequence, checked against a recording command list

use serial_test::serial;
use crate::config::EngineConfig;
use crate::cull::{CategoryFrame, CullFrameRecorder};
use crate::device::mock_device::{MockCommandList, RecordedCommand};
use crate::device::{
    AccessFlags, CommandList, DeviceFeatures, IndexType, NativeHandle, PipelineBindPoint,
    PipelineStageFlags, Rect2D, Viewport,
};
use crate::engine::Engine;

fn category(base: u64, instance_count: u32, draw_count: u32) -> CategoryFrame {
    CategoryFrame {
        results: NativeHandle(base + 1),
        indirect: NativeHandle(base + 2),
        command_bytes: u64::from(draw_count) * 20,
        filter_pipeline: NativeHandle(base + 3),
        filter_layout: NativeHandle(base + 4),
        filter_set: NativeHandle(base + 5),
        render_pipeline: NativeHandle(base + 6),
        render_layout: NativeHandle(base + 7),
        render_set: NativeHandle(base + 8),
        vertex_buffer: NativeHandle(base + 9),
        index_buffer: NativeHandle(base + 10),
        index_type: IndexType::U32,
        instance_count,
        draw_count,
        dynamic_viewport: true,
        dynamic_scissor: true,
    }
}

fn recorder(multi_draw_indirect: bool) -> CullFrameRecorder {
    Engine::reset_for_testing();
    CullFrameRecorder::new(DeviceFeatures { multi_draw_indirect })
}

fn viewport() -> Viewport {
    Viewport { x: 0.0, y: 0.0, width: 640.0, height: 480.0, min_depth: 0.0, max_depth: 1.0 }
}

fn scissor() -> Rect2D {
    Rect2D { x: 0, y: 0, width: 640, height: 480 }
}

fn record_compute(recorder: &CullFrameRecorder, frames: &[CategoryFrame]) -> Vec<RecordedCommand> {
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    recorder.record_compute(&mut cmd, frames).unwrap();
    cmd.end().unwrap();
    cmd.commands
}

fn record_draw(recorder: &CullFrameRecorder, frames: &[CategoryFrame]) -> Vec<RecordedCommand> {
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    recorder.record_draw(&mut cmd, frames, viewport(), scissor()).unwrap();
    cmd.end().unwrap();
    cmd.commands
}

fn draws(commands: &[RecordedCommand]) -> Vec<(NativeHandle, u64, u32, u32)> {
    commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::DrawIndexedIndirect { buffer, offset, draw_count, stride } => {
                Some((*buffer, *offset, *draw_count, *stride))
            }
            _ => None,
        })
        .collect()
}

// ============================================================================
// COMPUTE AND COPY
// ============================================================================

#[test]
#[serial]
fn test_compute_sequence_is_batched_across_categories() {
    let frames = [category(100, 40, 3), category(200, 5, 2)];
    let commands = record_compute(&recorder(true), &frames);

    assert_eq!(commands.len(), 11);
    assert!(commands[0].is_barrier(AccessFlags::HOST_WRITE, AccessFlags::SHADER_READ));
    assert_eq!(commands[1], RecordedCommand::BindPipeline(PipelineBindPoint::Compute, NativeHandle(103)));
    assert_eq!(
        commands[2],
        RecordedCommand::BindDescriptorSets {
            bind_point: PipelineBindPoint::Compute,
            layout: NativeHandle(104),
            first_set: 0,
            sets: vec![NativeHandle(105)],
        }
    );
    assert_eq!(commands[3], RecordedCommand::Dispatch(3, 1, 1));
    assert_eq!(commands[6], RecordedCommand::Dispatch(1, 1, 1));
    assert!(commands[7].is_barrier(AccessFlags::SHADER_WRITE, AccessFlags::TRANSFER_READ));
    assert!(matches!(commands[8], RecordedCommand::CopyBuffer { .. }));
    assert!(matches!(commands[9], RecordedCommand::CopyBuffer { .. }));
    assert!(commands[10].is_barrier(AccessFlags::TRANSFER_WRITE, AccessFlags::INDIRECT_COMMAND_READ));
}

#[test]
#[serial]
fn test_barriers_cover_the_right_buffers_and_stages() {
    let frames = [category(100, 1, 1), category(200, 1, 1)];
    let commands = record_compute(&recorder(true), &frames);

    let barriers: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::Barrier { src_stage, dst_stage, barriers } => Some((
                *src_stage,
                *dst_stage,
                barriers.iter().map(|b| b.buffer).collect::<Vec<_>>(),
            )),
            _ => None,
        })
        .collect();

    assert_eq!(
        barriers,
        vec![
            (PipelineStageFlags::HOST, PipelineStageFlags::COMPUTE_SHADER, vec![NativeHandle(101), NativeHandle(201)]),
            (PipelineStageFlags::COMPUTE_SHADER, PipelineStageFlags::TRANSFER, vec![NativeHandle(101), NativeHandle(201)]),
            (PipelineStageFlags::TRANSFER, PipelineStageFlags::DRAW_INDIRECT, vec![NativeHandle(102), NativeHandle(202)]),
        ]
    );
}

#[test]
#[serial]
fn test_copy_moves_whole_record_range_from_a_to_b() {
    let commands = record_compute(&recorder(true), &[category(100, 16, 7)]);
    let copy = commands
        .iter()
        .find(|c| matches!(c, RecordedCommand::CopyBuffer { .. }))
        .unwrap();

    match copy {
        RecordedCommand::CopyBuffer { src, dst, regions } => {
            assert_eq!(*src, NativeHandle(101));
            assert_eq!(*dst, NativeHandle(102));
            assert_eq!(regions.len(), 1);
            assert_eq!(regions[0].size, 140);
            assert_eq!(regions[0].src_offset, 0);
        }
        _ => unreachable!(),
    }
}

#[test]
#[serial]
fn test_dispatch_rounds_up_to_whole_groups() {
    let recorder = recorder(true);
    let dispatch = |instances| {
        record_compute(&recorder, &[category(100, instances, 1)])
            .into_iter()
            .find_map(|c| match c {
                RecordedCommand::Dispatch(x, _, _) => Some(x),
                _ => None,
            })
            .unwrap()
    };

    assert_eq!(dispatch(0), 0);
    assert_eq!(dispatch(1), 1);
    assert_eq!(dispatch(16), 1);
    assert_eq!(dispatch(17), 2);
    assert_eq!(dispatch(1000), 63);
}

#[test]
#[serial]
fn test_no_categories_records_nothing() {
    let recorder = recorder(true);
    assert!(record_compute(&recorder, &[]).is_empty());
    assert!(record_draw(&recorder, &[]).is_empty());
}

// ============================================================================
// DRAW
// ============================================================================

#[test]
#[serial]
fn test_multi_draw_indirect_issues_one_call_per_category() {
    let commands = record_draw(&recorder(true), &[category(100, 9, 4), category(200, 0, 2)]);

    assert_eq!(
        draws(&commands),
        vec![(NativeHandle(102), 0, 4, 20), (NativeHandle(202), 0, 2, 20)]
    );
}

#[test]
#[serial]
fn test_without_multi_draw_indirect_each_record_is_drawn_separately() {
    let commands = record_draw(&recorder(false), &[category(100, 9, 3)]);

    assert_eq!(
        draws(&commands),
        vec![
            (NativeHandle(102), 0, 1, 20),
            (NativeHandle(102), 20, 1, 20),
            (NativeHandle(102), 40, 1, 20),
        ]
    );
}

#[test]
#[serial]
fn test_draw_count_does_not_depend_on_instances() {
    let recorder = recorder(true);
    let empty = draws(&record_draw(&recorder, &[category(100, 0, 5)]));
    let full = draws(&record_draw(&recorder, &[category(100, 5000, 5)]));
    assert_eq!(empty, full);
    assert_eq!(empty[0].2, 5);
}

#[test]
#[serial]
fn test_draw_reads_only_buffer_b() {
    let commands = record_draw(&recorder(false), &[category(100, 3, 4)]);
    assert!(draws(&commands).iter().all(|(buffer, ..)| *buffer == NativeHandle(102)));
}

#[test]
#[serial]
fn test_draw_binds_before_drawing() {
    let mut frame = category(100, 3, 1);
    frame.dynamic_scissor = false;
    let commands = record_draw(&recorder(true), &[frame]);

    assert_eq!(commands[0], RecordedCommand::BindPipeline(PipelineBindPoint::Graphics, NativeHandle(106)));
    assert_eq!(commands[1], RecordedCommand::SetViewport(vec![viewport()]));
    assert!(matches!(commands[2], RecordedCommand::BindDescriptorSets { .. }));
    assert_eq!(commands[3], RecordedCommand::BindVertexBuffer(0, NativeHandle(109), 0));
    assert_eq!(commands[4], RecordedCommand::BindIndexBuffer(NativeHandle(110), 0, IndexType::U32));
    assert!(matches!(commands[5], RecordedCommand::DrawIndexedIndirect { .. }));
    assert_eq!(commands.len(), 6);
}

#[test]
#[serial]
fn test_override_forces_per_record_draws() {
    Engine::configure(EngineConfig {
        multi_draw_indirect_override: Some(false),
        ..EngineConfig::default()
    });
    let recorder = CullFrameRecorder::new(DeviceFeatures { multi_draw_indirect: true });
    Engine::reset_for_testing();

    assert!(!recorder.uses_multi_draw_indirect());
    assert_eq!(draws(&record_draw(&recorder, &[category(100, 1, 2)])).len(), 2);
}
