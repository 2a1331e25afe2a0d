/// ComputePipeline - exactly one compute stage

use std::sync::{Arc, Mutex};
use crate::context::{DeviceId, RenderContext};
use crate::device::{ComputePipelineDesc, NativeHandle, ShaderStageDesc, ShaderStageFlags};
use crate::error::Result;
use crate::node::{Node, NodeList, NodeVisitor};
use crate::pipeline::{PipelineCache, PipelineLayout, ShaderStageDefinition};
use crate::validation::{lock, PerDeviceCache, Validatable};
use crate::{engine_bail_contract, engine_debug};

const SOURCE: &str = "cullgraph::ComputePipeline";

struct ComputeState {
    stage: ShaderStageDefinition,
    cache: PerDeviceCache<NativeHandle>,
}

pub struct ComputePipeline {
    pipeline_cache: Arc<PipelineCache>,
    layout: Arc<PipelineLayout>,
    state: Mutex<ComputeState>,
    nodes: NodeList,
}

fn check_stage(stage: &ShaderStageDefinition) -> Result<()> {
    if stage.stage != ShaderStageFlags::COMPUTE {
        engine_bail_contract!(SOURCE, "compute pipeline given a {:?} stage", stage.stage);
    }
    Ok(())
}

impl ComputePipeline {
    pub fn new(
        pipeline_cache: Arc<PipelineCache>,
        layout: Arc<PipelineLayout>,
        stage: ShaderStageDefinition,
    ) -> Result<Arc<Self>> {
        check_stage(&stage)?;
        Ok(Arc::new(Self {
            pipeline_cache,
            layout,
            state: Mutex::new(ComputeState {
                stage,
                cache: PerDeviceCache::new(),
            }),
            nodes: NodeList::new(),
        }))
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    /// Replace the shader; invalidates the pipeline on every device
    pub fn set_shader_stage(&self, stage: ShaderStageDefinition) -> Result<()> {
        check_stage(&stage)?;
        {
            let mut state = lock(&self.state, SOURCE)?;
            state.stage = stage;
            state.cache.invalidate_all();
        }
        self.nodes.notify();
        Ok(())
    }

    pub fn add_node(&self, node: &Arc<dyn Node>) {
        self.nodes.add(node);
    }

    pub fn remove_node(&self, node: &Arc<dyn Node>) {
        self.nodes.remove(node);
    }

    pub fn is_valid(&self, device: DeviceId) -> bool {
        lock(&self.state, SOURCE).map(|s| s.cache.is_valid(device)).unwrap_or(false)
    }

    pub fn build_count(&self, device: DeviceId) -> u32 {
        lock(&self.state, SOURCE).map(|s| s.cache.build_count(device)).unwrap_or(0)
    }

    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        lock(&self.state, SOURCE)?.cache.handle(ctx.device_id(), "ComputePipeline")
    }
}

impl Validatable for ComputePipeline {
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        let mut state = lock(&self.state, SOURCE)?;
        let ComputeState { stage, cache } = &mut *state;
        if cache.is_valid(ctx.device_id()) {
            return Ok(());
        }

        self.pipeline_cache.validate(ctx)?;
        self.layout.validate(ctx)?;
        stage.module.validate(ctx)?;
        let desc = ComputePipelineDesc {
            layout: self.layout.handle(ctx)?,
            cache: self.pipeline_cache.handle(ctx)?,
            stage: ShaderStageDesc {
                stage: stage.stage,
                module: stage.module.handle(ctx)?,
                entry_point: stage.entry_point.as_str(),
            },
        };

        cache.validate_with(
            ctx,
            |device| {
                let handle = device.create_compute_pipeline(&desc)?;
                engine_debug!(SOURCE, "created {:?} from '{}'", handle, stage.module.name());
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

impl Node for ComputePipeline {
    fn accept(&self, visitor: &mut dyn NodeVisitor) {
        visitor.visit_compute_pipeline(self);
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.cache.clear(|device, handle| device.destroy_pipeline(handle));
        }
    }
}
