//! Unit tests for the draw record registry

use crate::cull::{DrawRecordRegistry, GeometryRange};
use crate::error::Error;

fn forest() -> DrawRecordRegistry {
    let mut registry = DrawRecordRegistry::new();
    let ground = registry.register_type("ground", 100.0).unwrap();
    let tree = registry.register_type("tree", 5.0).unwrap();
    registry.register_lod(ground, 0.0, 1000.0, vec![GeometryRange::new(6, 0, 0)]).unwrap();
    registry.register_lod(tree, 0.0, 100.0, vec![GeometryRange::new(300, 6, 4), GeometryRange::new(30, 306, 4)]).unwrap();
    registry.register_lod(tree, 100.0, 500.0, vec![GeometryRange::new(90, 336, 120)]).unwrap();
    registry
}

#[test]
fn test_type_ids_are_dense() {
    let registry = forest();
    assert_eq!(registry.type_count(), 2);
    assert_eq!(registry.type_id("tree"), Some(1));
    assert_eq!(registry.type_name(0), Some("ground"));
    assert_eq!(registry.type_id("house"), None);
}

#[test]
fn test_base_commands_follow_type_then_lod_order() {
    let registry = forest();
    let commands = registry.base_commands();

    assert_eq!(registry.record_count(), 4);
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[1].index_count, 300);
    assert_eq!(commands[3].first_index, 336);
    assert_eq!(commands[3].vertex_offset, 120);
    assert!(commands.iter().all(|c| c.instance_count == 0 && c.first_instance == 0));
    assert_eq!(registry.geom_to_type(), vec![0, 1, 1, 1]);
}

#[test]
fn test_type_and_lod_tables_index_each_other() {
    let registry = forest();
    let types = registry.type_definitions();
    let lods = registry.lod_definitions();

    assert_eq!(types[1].lod_first, 1);
    assert_eq!(types[1].lod_count, 2);
    assert_eq!(lods[1].record_first, 1);
    assert_eq!(lods[1].record_count, 2);
    assert_eq!(lods[2].record_first, 3);
    assert!(lods[2].contains(100.0));
    assert!(!lods[1].contains(100.0));
}

#[test]
fn test_invalid_registrations_are_rejected() {
    let mut registry = DrawRecordRegistry::new();
    assert!(matches!(registry.register_type("point", 0.0), Err(Error::ContractViolation(_))));

    let id = registry.register_type("car", 2.0).unwrap();
    let geometry = vec![GeometryRange::new(3, 0, 0)];
    assert!(matches!(registry.register_lod(9, 0.0, 1.0, geometry.clone()), Err(Error::ContractViolation(_))));
    assert!(matches!(registry.register_lod(id, 5.0, 5.0, geometry), Err(Error::ContractViolation(_))));
    assert!(matches!(registry.register_lod(id, 0.0, 5.0, Vec::new()), Err(Error::ContractViolation(_))));
    assert_eq!(registry.record_count(), 0);
}
