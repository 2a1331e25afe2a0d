/// CullCategory - buffers, pipelines and sets of one group of culled objects

use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use crate::context::RenderContext;
use crate::cull::{
    compute_instance_offsets, CategoryFrame, DrawIndexedIndirectCommand, DrawRecordRegistry,
    InstanceOffsets, LodDefinition, TypeDefinition,
};
use crate::descriptor::{DescriptorSet, GpuBuffer, Resource};
use crate::device::{BufferUsage, DescriptorType, DynamicState, IndexType};
use crate::error::Result;
use crate::frame::{DynamicInstance, StaticInstance};
use crate::pipeline::{ComputePipeline, GraphicsPipeline};
use crate::validation::{lock, Validatable};
use crate::{engine_bail_contract, engine_contract_err, engine_trace};

const SOURCE: &str = "cullgraph::CullCategory";

/// Instance record that knows which object type it belongs to
pub trait InstanceRecord: Pod + Send + Sync {
    fn type_id(&self) -> u32;
}

impl InstanceRecord for StaticInstance {
    fn type_id(&self) -> u32 {
        self.type_id
    }
}

impl InstanceRecord for DynamicInstance {
    fn type_id(&self) -> u32 {
        self.type_id
    }
}

/// Shared vertex and index data of every geometry a category draws
pub struct GeometryBuffers {
    pub vertices: Arc<GpuBuffer<f32>>,
    pub indices: Arc<GpuBuffer<u32>>,
}

impl GeometryBuffers {
    pub fn new(vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            vertices: GpuBuffer::new(vertices, BufferUsage::VERTEX, DescriptorType::StorageBuffer),
            indices: GpuBuffer::new(indices, BufferUsage::INDEX, DescriptorType::StorageBuffer),
        }
    }

    pub fn index_type(&self) -> IndexType {
        IndexType::U32
    }
}

#[derive(Default)]
struct CategoryBindings {
    filter: Option<(Arc<ComputePipeline>, Arc<DescriptorSet>)>,
    render: Option<(Arc<GraphicsPipeline>, Arc<DescriptorSet>)>,
}

/// One culled object category (static scenery, moving objects, ...)
///
/// Owns the draw-command pair: `results` (A) is reset by the host every
/// frame and filled by the filter shader, `indirect` (B) receives a copy of
/// A and is what the draw calls read. The filter and render descriptor sets
/// are built by the caller from the buffers exposed here.
pub struct CullCategory<I: InstanceRecord> {
    name: String,
    type_count: u32,
    geom_to_type: Vec<u32>,
    base_commands: Vec<DrawIndexedIndirectCommand>,
    types: Arc<GpuBuffer<TypeDefinition>>,
    lods: Arc<GpuBuffer<LodDefinition>>,
    results: Arc<GpuBuffer<DrawIndexedIndirectCommand>>,
    indirect: Arc<GpuBuffer<DrawIndexedIndirectCommand>>,
    instance_indices: Arc<GpuBuffer<u32>>,
    instances: Arc<GpuBuffer<I>>,
    geometry: GeometryBuffers,
    bindings: Mutex<CategoryBindings>,
    offsets: Mutex<Option<InstanceOffsets>>,
}

impl<I: InstanceRecord> CullCategory<I> {
    /// Fails when the registry has no draw records
    pub fn new(name: impl Into<String>, registry: &DrawRecordRegistry, geometry: GeometryBuffers) -> Result<Self> {
        let name = name.into();
        let base_commands = registry.base_commands();
        if base_commands.is_empty() {
            engine_bail_contract!(SOURCE, "category '{}' has no draw records", name);
        }
        Ok(Self {
            name,
            type_count: registry.type_count(),
            geom_to_type: registry.geom_to_type(),
            types: GpuBuffer::storage(registry.type_definitions(), BufferUsage::empty()),
            lods: GpuBuffer::storage(registry.lod_definitions(), BufferUsage::empty()),
            results: GpuBuffer::storage(base_commands.clone(), BufferUsage::TRANSFER_SRC),
            indirect: GpuBuffer::storage(
                base_commands.clone(),
                BufferUsage::INDIRECT | BufferUsage::TRANSFER_DST,
            ),
            base_commands,
            instance_indices: GpuBuffer::storage(Vec::new(), BufferUsage::empty()),
            instances: GpuBuffer::storage(Vec::new(), BufferUsage::empty()),
            geometry,
            bindings: Mutex::new(CategoryBindings::default()),
            offsets: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of draw records; the draw count of every frame
    pub fn record_count(&self) -> u32 {
        self.base_commands.len() as u32
    }

    pub fn geom_to_type(&self) -> &[u32] {
        &self.geom_to_type
    }

    // ===== BUFFERS =====

    pub fn type_table(&self) -> Arc<GpuBuffer<TypeDefinition>> {
        self.types.clone()
    }

    pub fn lod_table(&self) -> Arc<GpuBuffer<LodDefinition>> {
        self.lods.clone()
    }

    /// Buffer A: written by the host and the filter shader
    pub fn results(&self) -> Arc<GpuBuffer<DrawIndexedIndirectCommand>> {
        self.results.clone()
    }

    /// Buffer B: read by the indirect draws
    pub fn indirect(&self) -> Arc<GpuBuffer<DrawIndexedIndirectCommand>> {
        self.indirect.clone()
    }

    pub fn instance_indices(&self) -> Arc<GpuBuffer<u32>> {
        self.instance_indices.clone()
    }

    pub fn instances(&self) -> Arc<GpuBuffer<I>> {
        self.instances.clone()
    }

    pub fn geometry(&self) -> &GeometryBuffers {
        &self.geometry
    }

    // ===== PIPELINES =====

    pub fn set_filter(&self, pipeline: Arc<ComputePipeline>, set: Arc<DescriptorSet>) -> Result<()> {
        lock(&self.bindings, SOURCE)?.filter = Some((pipeline, set));
        Ok(())
    }

    pub fn set_render(&self, pipeline: Arc<GraphicsPipeline>, set: Arc<DescriptorSet>) -> Result<()> {
        lock(&self.bindings, SOURCE)?.render = Some((pipeline, set));
        Ok(())
    }

    // ===== PER FRAME =====

    /// Upload this frame's instances and reset buffer A
    ///
    /// Recomputes the per-record offsets, writes A with `instance_count = 0`
    /// and the new `first_instance` values, and sizes the index buffer to
    /// the offsets' total.
    pub fn prepare(&self, instances: Vec<I>) -> Result<InstanceOffsets> {
        let type_ids: Vec<u32> = instances.iter().map(|i| i.type_id()).collect();
        let offsets = compute_instance_offsets(&type_ids, self.type_count, &self.geom_to_type)?;

        let commands = self
            .base_commands
            .iter()
            .zip(&offsets.first_instance)
            .map(|(base, &first_instance)| DrawIndexedIndirectCommand {
                instance_count: 0,
                first_instance,
                ..*base
            })
            .collect();
        self.results.set(commands)?;
        self.instance_indices.resize(offsets.total as usize)?;
        self.instances.set(instances)?;

        engine_trace!(SOURCE, "'{}': {} instances over {} records", self.name, type_ids.len(), offsets.record_count());
        *lock(&self.offsets, SOURCE)? = Some(offsets.clone());
        Ok(offsets)
    }

    /// Offsets computed by the last `prepare`
    pub fn offsets(&self) -> Option<InstanceOffsets> {
        lock(&self.offsets, SOURCE).ok()?.clone()
    }

    /// Validate everything the frame binds and collect the native handles
    pub fn validate(&self, ctx: &RenderContext) -> Result<CategoryFrame> {
        let (filter_pipeline, filter_set, render_pipeline, render_set) = {
            let bindings = lock(&self.bindings, SOURCE)?;
            let (filter_pipeline, filter_set) = bindings
                .filter
                .clone()
                .ok_or_else(|| engine_contract_err!(SOURCE, "'{}' has no filter pipeline", self.name))?;
            let (render_pipeline, render_set) = bindings
                .render
                .clone()
                .ok_or_else(|| engine_contract_err!(SOURCE, "'{}' has no render pipeline", self.name))?;
            (filter_pipeline, filter_set, render_pipeline, render_set)
        };

        self.types.validate(ctx)?;
        self.lods.validate(ctx)?;
        self.results.validate(ctx)?;
        self.indirect.validate(ctx)?;
        self.instance_indices.validate(ctx)?;
        self.instances.validate(ctx)?;
        self.geometry.vertices.validate(ctx)?;
        self.geometry.indices.validate(ctx)?;

        filter_pipeline.validate(ctx)?;
        render_pipeline.validate(ctx)?;
        filter_set.validate(ctx)?;
        render_set.validate(ctx)?;

        Ok(CategoryFrame {
            results: self.results.handle(ctx)?,
            indirect: self.indirect.handle(ctx)?,
            command_bytes: u64::from(self.record_count()) * u64::from(DrawIndexedIndirectCommand::STRIDE),
            filter_pipeline: filter_pipeline.handle(ctx)?,
            filter_layout: filter_pipeline.layout().handle(ctx)?,
            filter_set: filter_set.handle(ctx)?,
            render_pipeline: render_pipeline.handle(ctx)?,
            render_layout: render_pipeline.layout().handle(ctx)?,
            render_set: render_set.handle(ctx)?,
            vertex_buffer: self.geometry.vertices.handle(ctx)?,
            index_buffer: self.geometry.indices.handle(ctx)?,
            index_type: self.geometry.index_type(),
            instance_count: self.instances.len() as u32,
            draw_count: self.record_count(),
            dynamic_viewport: render_pipeline.has_dynamic_state(DynamicState::Viewport),
            dynamic_scissor: render_pipeline.has_dynamic_state(DynamicState::Scissor),
        })
    }
}
