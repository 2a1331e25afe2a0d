/// DrawRecordRegistry - object types, their LODs and the draw records they produce

use crate::cull::{DrawIndexedIndirectCommand, GeometryRange, LodDefinition, TypeDefinition};
use crate::engine_bail_contract;
use crate::error::Result;

const SOURCE: &str = "cullgraph::DrawRecordRegistry";

struct LodEntry {
    min_distance: f32,
    max_distance: f32,
    geometries: Vec<GeometryRange>,
}

struct TypeEntry {
    name: String,
    bounding_radius: f32,
    lods: Vec<LodEntry>,
}

/// Registered object types of one culling category
///
/// Draw records are laid out type by type, LOD by LOD, geometry by geometry.
/// Type ids are dense and start at 0.
#[derive(Default)]
pub struct DrawRecordRegistry {
    types: Vec<TypeEntry>,
}

impl DrawRecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type and return its id
    pub fn register_type(&mut self, name: impl Into<String>, bounding_radius: f32) -> Result<u32> {
        let name = name.into();
        if !(bounding_radius > 0.0) {
            engine_bail_contract!(SOURCE, "type '{}' with bounding radius {}", name, bounding_radius);
        }
        self.types.push(TypeEntry {
            name,
            bounding_radius,
            lods: Vec::new(),
        });
        Ok(self.types.len() as u32 - 1)
    }

    /// Add a LOD drawn for distances in `[min_distance, max_distance)`
    pub fn register_lod(
        &mut self,
        type_id: u32,
        min_distance: f32,
        max_distance: f32,
        geometries: Vec<GeometryRange>,
    ) -> Result<()> {
        let Some(entry) = self.types.get_mut(type_id as usize) else {
            engine_bail_contract!(SOURCE, "LOD registered for unknown type {}", type_id);
        };
        if !(min_distance >= 0.0 && min_distance < max_distance) {
            engine_bail_contract!(
                SOURCE,
                "type '{}': LOD range [{}, {}) is empty",
                entry.name,
                min_distance,
                max_distance
            );
        }
        if geometries.is_empty() {
            engine_bail_contract!(SOURCE, "type '{}': LOD without geometry", entry.name);
        }
        entry.lods.push(LodEntry {
            min_distance,
            max_distance,
            geometries,
        });
        Ok(())
    }

    pub fn type_count(&self) -> u32 {
        self.types.len() as u32
    }

    pub fn type_id(&self, name: &str) -> Option<u32> {
        self.types.iter().position(|t| t.name == name).map(|i| i as u32)
    }

    pub fn type_name(&self, type_id: u32) -> Option<&str> {
        self.types.get(type_id as usize).map(|t| t.name.as_str())
    }

    pub fn record_count(&self) -> u32 {
        self.types
            .iter()
            .flat_map(|t| t.lods.iter())
            .map(|l| l.geometries.len() as u32)
            .sum()
    }

    /// Draw records with `instance_count = 0` and `first_instance = 0`
    pub fn base_commands(&self) -> Vec<DrawIndexedIndirectCommand> {
        self.types
            .iter()
            .flat_map(|t| t.lods.iter())
            .flat_map(|l| l.geometries.iter())
            .map(|g| DrawIndexedIndirectCommand {
                index_count: g.index_count,
                instance_count: 0,
                first_index: g.first_index,
                vertex_offset: g.vertex_offset,
                first_instance: 0,
            })
            .collect()
    }

    /// Type id of every draw record
    pub fn geom_to_type(&self) -> Vec<u32> {
        self.types
            .iter()
            .enumerate()
            .flat_map(|(type_id, t)| {
                let records: usize = t.lods.iter().map(|l| l.geometries.len()).sum();
                std::iter::repeat(type_id as u32).take(records)
            })
            .collect()
    }

    pub fn type_definitions(&self) -> Vec<TypeDefinition> {
        let mut lod_first = 0;
        self.types
            .iter()
            .map(|t| {
                let definition = TypeDefinition {
                    bounding_radius: t.bounding_radius,
                    lod_first,
                    lod_count: t.lods.len() as u32,
                    std430_pad0: 0,
                };
                lod_first += t.lods.len() as u32;
                definition
            })
            .collect()
    }

    pub fn lod_definitions(&self) -> Vec<LodDefinition> {
        let mut record_first = 0;
        self.types
            .iter()
            .flat_map(|t| t.lods.iter())
            .map(|l| {
                let definition = LodDefinition {
                    min_distance: l.min_distance,
                    max_distance: l.max_distance,
                    record_first,
                    record_count: l.geometries.len() as u32,
                };
                record_first += l.geometries.len() as u32;
                definition
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
