/// Per-record instance ranges inside the visible-instance index buffer

use std::ops::Range;
use crate::engine_bail_contract;
use crate::error::Result;

const SOURCE: &str = "cullgraph::InstanceOffsets";

/// Where each draw record's visible instances go
///
/// Record `i` owns `[first_instance[i], first_instance[i] + counts[i])`,
/// sized for every instance of its type, so the ranges partition
/// `[0, total)` in record order. The filter shader appends into these
/// ranges and bumps `instance_count`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceOffsets {
    pub first_instance: Vec<u32>,
    pub counts: Vec<u32>,
    pub total: u32,
}

impl InstanceOffsets {
    pub fn range(&self, record: usize) -> Range<u32> {
        let first = self.first_instance[record];
        first..first + self.counts[record]
    }

    pub fn record_count(&self) -> usize {
        self.first_instance.len()
    }

    /// CPU reference of the index buffer layout when every instance is visible
    ///
    /// Each record's range holds the indices of all instances of its type,
    /// in instance order.
    pub fn scatter(&self, type_ids: &[u32], geom_to_type: &[u32]) -> Vec<u32> {
        let mut indices = vec![0u32; self.total as usize];
        for (record, &type_id) in geom_to_type.iter().enumerate() {
            let range = self.range(record);
            let matching = type_ids
                .iter()
                .enumerate()
                .filter(|&(_, &t)| t == type_id)
                .map(|(i, _)| i as u32);
            for (slot, index) in range.zip(matching) {
                indices[slot as usize] = index;
            }
        }
        indices
    }
}

/// Exclusive prefix sum of per-record instance counts
///
/// Fails when an instance names a type id `>= type_count`.
pub fn compute_instance_offsets(type_ids: &[u32], type_count: u32, geom_to_type: &[u32]) -> Result<InstanceOffsets> {
    let mut per_type = vec![0u32; type_count as usize];
    for &type_id in type_ids {
        match per_type.get_mut(type_id as usize) {
            Some(count) => *count += 1,
            None => engine_bail_contract!(SOURCE, "instance type {} outside {} types", type_id, type_count),
        }
    }

    let mut offsets = InstanceOffsets {
        first_instance: Vec::with_capacity(geom_to_type.len()),
        counts: Vec::with_capacity(geom_to_type.len()),
        total: 0,
    };
    for &type_id in geom_to_type {
        let Some(&count) = per_type.get(type_id as usize) else {
            engine_bail_contract!(SOURCE, "draw record of type {} outside {} types", type_id, type_count);
        };
        offsets.first_instance.push(offsets.total);
        offsets.counts.push(count);
        offsets.total += count;
    }
    Ok(offsets)
}

#[cfg(test)]
#[path = "offsets_tests.rs"]
mod tests;
