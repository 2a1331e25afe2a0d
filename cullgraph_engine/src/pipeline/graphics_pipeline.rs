/// GraphicsPipeline - fixed-function state, vertex input and 1 to 5 shader stages

use std::sync::{Arc, Mutex};
use crate::context::{DeviceId, RenderContext};
use crate::device::{
    AttachmentFormat, BlendAttachmentDefinition, DepthStencilState, DynamicState,
    FixedFunctionState, GraphicsPipelineDesc, MultisampleState, NativeHandle,
    PrimitiveTopology, RasterizationState, Rect2D, ShaderStageDesc, ShaderStageFlags,
    VertexAttributeDesc, VertexBindingDesc, VertexInputDefinition, Viewport,
};
use crate::error::Result;
use crate::node::{Node, NodeList, NodeVisitor};
use crate::pipeline::{PipelineCache, PipelineLayout, ShaderStageDefinition};
use crate::validation::{lock, PerDeviceCache, Validatable};
use crate::{engine_bail_contract, engine_debug};

const SOURCE: &str = "cullgraph::GraphicsPipeline";

/// Vertex, tessellation control/evaluation, geometry, fragment
const MAX_GRAPHICS_STAGES: usize = 5;

struct GraphicsState {
    fixed: FixedFunctionState,
    vertex_inputs: Vec<VertexInputDefinition>,
    stages: Vec<ShaderStageDefinition>,
    cache: PerDeviceCache<NativeHandle>,
}

/// Graphics pipeline node
///
/// Every setter marks the pipeline for rebuild on all devices, whether or
/// not the value actually changed, and tells the registered recording nodes
/// to re-record. The old native pipeline is destroyed once `validate` has
/// built its replacement.
pub struct GraphicsPipeline {
    pipeline_cache: Arc<PipelineCache>,
    layout: Arc<PipelineLayout>,
    state: Mutex<GraphicsState>,
    nodes: NodeList,
}

impl GraphicsPipeline {
    pub fn new(pipeline_cache: Arc<PipelineCache>, layout: Arc<PipelineLayout>) -> Arc<Self> {
        Arc::new(Self {
            pipeline_cache,
            layout,
            state: Mutex::new(GraphicsState {
                fixed: FixedFunctionState::default(),
                vertex_inputs: Vec::new(),
                stages: Vec::new(),
                cache: PerDeviceCache::new(),
            }),
            nodes: NodeList::new(),
        })
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    pub fn pipeline_cache(&self) -> &Arc<PipelineCache> {
        &self.pipeline_cache
    }

    fn update<F: FnOnce(&mut GraphicsState)>(&self, f: F) -> Result<()> {
        {
            let mut state = lock(&self.state, SOURCE)?;
            f(&mut state);
            state.cache.invalidate_all();
        }
        self.nodes.notify();
        Ok(())
    }

    // ===== CONSUMER NODES =====

    /// Register a node that records commands binding this pipeline
    pub fn add_node(&self, node: &Arc<dyn Node>) {
        self.nodes.add(node);
    }

    pub fn remove_node(&self, node: &Arc<dyn Node>) {
        self.nodes.remove(node);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ===== SETTERS =====

    pub fn set_fixed_function(&self, fixed: FixedFunctionState) -> Result<()> {
        self.update(|s| s.fixed = fixed)
    }

    pub fn set_topology(&self, topology: PrimitiveTopology, primitive_restart: bool) -> Result<()> {
        self.update(|s| {
            s.fixed.topology = topology;
            s.fixed.primitive_restart = primitive_restart;
        })
    }

    pub fn set_patch_control_points(&self, points: u32) -> Result<()> {
        self.update(|s| s.fixed.patch_control_points = points)
    }

    pub fn set_rasterization(&self, rasterization: RasterizationState) -> Result<()> {
        self.update(|s| s.fixed.rasterization = rasterization)
    }

    pub fn set_depth_stencil(&self, depth_stencil: DepthStencilState) -> Result<()> {
        self.update(|s| s.fixed.depth_stencil = depth_stencil)
    }

    pub fn set_blend_attachments(&self, attachments: Vec<BlendAttachmentDefinition>) -> Result<()> {
        self.update(|s| s.fixed.blend_attachments = attachments)
    }

    pub fn set_blend_constants(&self, constants: [f32; 4]) -> Result<()> {
        self.update(|s| s.fixed.blend_constants = constants)
    }

    pub fn set_multisample(&self, multisample: MultisampleState) -> Result<()> {
        self.update(|s| s.fixed.multisample = multisample)
    }

    pub fn set_viewports(&self, viewports: Vec<Viewport>) -> Result<()> {
        self.update(|s| s.fixed.viewports = viewports)
    }

    pub fn set_scissors(&self, scissors: Vec<Rect2D>) -> Result<()> {
        self.update(|s| s.fixed.scissors = scissors)
    }

    pub fn set_dynamic_states(&self, dynamic_states: Vec<DynamicState>) -> Result<()> {
        self.update(|s| s.fixed.dynamic_states = dynamic_states)
    }

    pub fn set_attachment_formats(&self, color: Vec<AttachmentFormat>, depth: Option<AttachmentFormat>) -> Result<()> {
        self.update(|s| {
            s.fixed.color_formats = color;
            s.fixed.depth_format = depth;
        })
    }

    /// Fails when a binding declares no attributes
    pub fn set_vertex_inputs(&self, vertex_inputs: Vec<VertexInputDefinition>) -> Result<()> {
        if let Some(empty) = vertex_inputs.iter().find(|v| v.attributes.is_empty()) {
            engine_bail_contract!(SOURCE, "vertex binding {} has no attributes", empty.binding);
        }
        self.update(|s| s.vertex_inputs = vertex_inputs)
    }

    /// Fails on an empty list, more than five stages, a compute stage or a repeated stage
    pub fn set_shader_stages(&self, stages: Vec<ShaderStageDefinition>) -> Result<()> {
        if stages.is_empty() {
            engine_bail_contract!(SOURCE, "empty shader stage list");
        }
        if stages.len() > MAX_GRAPHICS_STAGES {
            engine_bail_contract!(SOURCE, "{} shader stages, at most {}", stages.len(), MAX_GRAPHICS_STAGES);
        }
        let mut seen = ShaderStageFlags::empty();
        for stage in &stages {
            if !ShaderStageFlags::ALL_GRAPHICS.contains(stage.stage) || stage.stage.bits().count_ones() != 1 {
                engine_bail_contract!(SOURCE, "{:?} is not a single graphics stage", stage.stage);
            }
            if seen.contains(stage.stage) {
                engine_bail_contract!(SOURCE, "{:?} stage given twice", stage.stage);
            }
            seen |= stage.stage;
        }
        self.update(|s| s.stages = stages)
    }

    // ===== QUERIES =====

    pub fn has_dynamic_state(&self, state: DynamicState) -> bool {
        lock(&self.state, SOURCE)
            .map(|s| s.fixed.dynamic_states.contains(&state))
            .unwrap_or(false)
    }

    pub fn has_shader_stage(&self, stage: ShaderStageFlags) -> bool {
        lock(&self.state, SOURCE)
            .map(|s| s.stages.iter().any(|d| d.stage == stage))
            .unwrap_or(false)
    }

    pub fn fixed_function(&self) -> FixedFunctionState {
        lock(&self.state, SOURCE).map(|s| s.fixed.clone()).unwrap_or_default()
    }

    pub fn is_valid(&self, device: DeviceId) -> bool {
        lock(&self.state, SOURCE).map(|s| s.cache.is_valid(device)).unwrap_or(false)
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        lock(&self.state, SOURCE).map(|s| s.cache.build_count(device)).unwrap_or(0)
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.state, SOURCE)?.cache.handle(ctx.device_id(), "GraphicsPipeline")
    }
}

/// Vertex bindings plus attributes with locations running across all bindings
fn flatten_vertex_inputs(inputs: &[VertexInputDefinition]) -> (Vec<VertexBindingDesc>, Vec<VertexAttributeDesc>) {
    let mut bindings = Vec::with_capacity(inputs.len());
    let mut attributes = Vec::new();
    let mut location = 0;
    for input in inputs {
        bindings.push(VertexBindingDesc {
            binding: input.binding,
            stride: input.stride(),
            input_rate: input.input_rate,
        });
        let mut offset = 0;
        for format in &input.attributes {
            attributes.push(VertexAttributeDesc {
                location,
                binding: input.binding,
                format: *format,
                offset,
            });
            location += 1;
            offset += format.size_bytes();
        }
    }
    (bindings, attributes)
}

impl Validatable for GraphicsPipeline {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        let mut state = lock(&self.state, SOURCE)?;
        let GraphicsState { fixed, vertex_inputs, stages: definitions, cache } = &mut *state;
        if definitions.is_empty() {
            engine_bail_contract!(SOURCE, "validated without shader stages");
        }
        if cache.is_valid(ctx.device_id()) {
            return Ok(());
        }

        self.pipeline_cache.validate(ctx)?;
        self.layout.validate(ctx)?;
        let mut stages = Vec::with_capacity(definitions.len());
        for definition in definitions.iter() {
            definition.module.validate(ctx)?;
            stages.push(ShaderStageDesc {
                stage: definition.stage,
                module: definition.module.handle(ctx)?,
                entry_point: definition.entry_point.as_str(),
            });
        }
        let (vertex_bindings, vertex_attributes) = flatten_vertex_inputs(vertex_inputs);
        let desc = GraphicsPipelineDesc {
            layout: self.layout.handle(ctx)?,
            cache: self.pipeline_cache.handle(ctx)?,
            stages: &stages,
            vertex_bindings: &vertex_bindings,
            vertex_attributes: &vertex_attributes,
            fixed: &*fixed,
        };

        cache.validate_with(
            ctx,
            |device| {
                let handle = device.create_graphics_pipeline(&desc)?;
                engine_debug!(SOURCE, "created {:?} with {} stages on device {}",
                    handle, desc.stages.len(), device.id().0);
                Ok(handle)
            },
            |device, old| device.destroy_pipeline(old),
        )?;
        Ok(())
    }

    fn invalidate(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.cache.invalidate_all();
        }
        self.nodes.notify();
    }
}

impl Node for GraphicsPipeline {
    fn accept(&self, visitor: &mut dyn NodeVisitor) {
        visitor.visit_graphics_pipeline(self);
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.cache.clear(|device, handle| device.destroy_pipeline(handle));
        }
    }
}
