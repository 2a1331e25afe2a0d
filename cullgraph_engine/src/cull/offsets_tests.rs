//! Unit tests for per-record instance offsets

use crate::cull::compute_instance_offsets;
use crate::error::Error;

fn type_ids(counts: &[u32]) -> Vec<u32> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(type_id, &count)| std::iter::repeat(type_id as u32).take(count as usize))
        .collect()
}

#[test]
fn test_offsets_are_exclusive_prefix_sum() {
    let offsets = compute_instance_offsets(&type_ids(&[10, 0, 5]), 3, &[0, 1, 2]).unwrap();

    assert_eq!(offsets.first_instance, vec![0, 10, 10]);
    assert_eq!(offsets.counts, vec![10, 0, 5]);
    assert_eq!(offsets.total, 15);
    assert_eq!(offsets.range(2), 10..15);
    assert!(offsets.range(1).is_empty());
}

#[test]
fn test_every_lod_record_gets_the_full_type_count() {
    // type 0 has three LOD records, type 1 has one
    let offsets = compute_instance_offsets(&[1, 0, 0, 1, 0], 2, &[0, 0, 0, 1]).unwrap();

    assert_eq!(offsets.counts, vec![3, 3, 3, 2]);
    assert_eq!(offsets.first_instance, vec![0, 3, 6, 9]);
    assert_eq!(offsets.total, 11);
}

#[test]
fn test_ranges_partition_the_index_buffer() {
    let offsets = compute_instance_offsets(&type_ids(&[4, 7, 0, 2]), 4, &[0, 1, 1, 2, 3]).unwrap();

    let mut next = 0;
    for record in 0..offsets.record_count() {
        let range = offsets.range(record);
        assert_eq!(range.start, next);
        next = range.end;
    }
    assert_eq!(next, offsets.total);
}

#[test]
fn test_no_instances_gives_empty_ranges() {
    let offsets = compute_instance_offsets(&[], 2, &[0, 1, 1]).unwrap();
    assert_eq!(offsets.first_instance, vec![0, 0, 0]);
    assert_eq!(offsets.total, 0);
}

#[test]
fn test_unknown_type_is_rejected() {
    assert!(matches!(compute_instance_offsets(&[0, 3], 2, &[0, 1]), Err(Error::ContractViolation(_))));
    assert!(matches!(compute_instance_offsets(&[0], 2, &[0, 2]), Err(Error::ContractViolation(_))));
}

#[test]
fn test_scatter_places_instances_in_their_type_ranges() {
    let ids = [2, 0, 2, 0, 0];
    let geom_to_type = [0, 1, 2];
    let offsets = compute_instance_offsets(&ids, 3, &geom_to_type).unwrap();

    let indices = offsets.scatter(&ids, &geom_to_type);

    assert_eq!(indices, vec![1, 3, 4, 0, 2]);
}
