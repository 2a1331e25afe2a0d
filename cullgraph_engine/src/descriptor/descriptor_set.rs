/// DescriptorSet - per-surface, per-frame-slot native descriptor sets

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use crate::context::{RenderContext, SurfaceId};
use crate::descriptor::{Descriptor, DescriptorPool, DescriptorSetLayout, Resource};
use crate::device::{DescriptorType, DescriptorWrite, NativeHandle};
use crate::error::Result;
use crate::node::Node;
use crate::validation::{lock, PerSurfaceCache, Validatable};
use crate::{engine_bail_contract, engine_contract_err, engine_trace};

const SOURCE: &str = "cullgraph::DescriptorSet";

struct DescriptorSetState {
    descriptors: BTreeMap<u32, Arc<Descriptor>>,
    nodes: Vec<Weak<dyn Node>>,
    cache: PerSurfaceCache<NativeHandle>,
}

/// Logical descriptor set: layout + pool + binding → descriptor map
///
/// Native sets exist once per frame slot of every surface the set is used
/// on. Any descriptor change invalidates all slots; each slot is rewritten
/// lazily the next time it is validated, reusing its native allocation.
pub struct DescriptorSet {
    layout: Arc<DescriptorSetLayout>,
    pool: Arc<DescriptorPool>,
    self_ref: Weak<DescriptorSet>,
    state: Mutex<DescriptorSetState>,
}

impl DescriptorSet {
    /// Fails when `pool` cannot serve every descriptor type of `layout`
    pub fn new(layout: Arc<DescriptorSetLayout>, pool: Arc<DescriptorPool>) -> Result<Arc<Self>> {
        if !pool.supports(&layout) {
            engine_bail_contract!(SOURCE, "pool shape does not cover the layout's descriptor types");
        }
        Ok(Arc::new_cyclic(|self_ref| Self {
            layout,
            pool,
            self_ref: self_ref.clone(),
            state: Mutex::new(DescriptorSetState {
                descriptors: BTreeMap::new(),
                nodes: Vec::new(),
                cache: PerSurfaceCache::new(),
            }),
        }))
    }

    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        &self.pool
    }

    // ===== DESCRIPTORS =====

    /// Bind `resources` to `binding` with an explicit descriptor type
    ///
    /// The binding must exist in the layout with the same type and room for
    /// `resources.len()` descriptors; violations fail here, not at validate
    /// time. Replaces any previous descriptor and invalidates all slots.
    pub fn set_descriptor(
        &self,
        binding: u32,
        resources: Vec<Arc<dyn Resource>>,
        descriptor_type: DescriptorType,
    ) -> Result<()> {
        let declared = self.layout.binding(binding).ok_or_else(|| {
            engine_contract_err!(SOURCE, "binding {} is not part of the layout", binding)
        })?;
        if declared.descriptor_type != descriptor_type {
            engine_bail_contract!(
                SOURCE,
                "binding {} declared as {:?}, got {:?}",
                binding,
                declared.descriptor_type,
                descriptor_type
            );
        }
        if resources.is_empty() || resources.len() as u32 > declared.count {
            engine_bail_contract!(
                SOURCE,
                "binding {} takes 1..={} resources, got {}",
                binding,
                declared.count,
                resources.len()
            );
        }

        let descriptor = Descriptor::new(self.self_ref.clone(), binding, resources, descriptor_type);
        let previous = lock(&self.state, SOURCE)?.descriptors.insert(binding, descriptor);
        if let Some(previous) = previous {
            previous.unregister();
        }
        self.invalidate();
        Ok(())
    }

    /// Bind `resources` using the first resource's default descriptor type
    pub fn set_descriptor_default(&self, binding: u32, resources: Vec<Arc<dyn Resource>>) -> Result<()> {
        let descriptor_type = resources
            .first()
            .map(|r| r.default_descriptor_type())
            .ok_or_else(|| engine_contract_err!(SOURCE, "binding {} set without resources", binding))?;
        self.set_descriptor(binding, resources, descriptor_type)
    }

    /// Remove the descriptor at `binding` and invalidate all slots
    pub fn reset_descriptor(&self, binding: u32) -> Result<()> {
        let previous = lock(&self.state, SOURCE)?.descriptors.remove(&binding);
        if let Some(previous) = previous {
            previous.unregister();
            self.invalidate();
        }
        Ok(())
    }

    pub fn descriptor(&self, binding: u32) -> Option<Arc<Descriptor>> {
        lock(&self.state, SOURCE).ok()?.descriptors.get(&binding).cloned()
    }

    pub fn descriptor_count(&self) -> usize {
        lock(&self.state, SOURCE).map(|s| s.descriptors.len()).unwrap_or(0)
    }

    // ===== CONSUMER NODES =====

    /// Register a node that records commands binding this set
    pub fn add_node(&self, node: &Arc<dyn Node>) {
        if let Ok(mut state) = self.state.lock() {
            let weak = Arc::downgrade(node);
            if !state.nodes.iter().any(|n| n.ptr_eq(&weak)) {
                state.nodes.push(weak);
            }
        }
    }

    pub fn remove_node(&self, node: &Arc<dyn Node>) {
        if let Ok(mut state) = self.state.lock() {
            let weak = Arc::downgrade(node);
            state.nodes.retain(|n| !n.ptr_eq(&weak));
        }
    }

    /// Live consumer nodes
    pub fn node_count(&self) -> usize {
        lock(&self.state, SOURCE)
            .map(|s| s.nodes.iter().filter(|n| n.strong_count() > 0).count())
            .unwrap_or(0)
    }

    // ===== VALIDATION =====

    /// Mark every slot of every surface invalid and notify consumer nodes
    ///
    /// Handles stay alive; repeated calls only repeat the marking.
    pub fn invalidate(&self) {
        let nodes: Vec<Arc<dyn Node>> = match self.state.lock() {
            Ok(mut state) => {
                state.cache.invalidate_all();
                state.nodes.retain(|n| n.strong_count() > 0);
                state.nodes.iter().filter_map(|n| n.upgrade()).collect()
            }
            Err(_) => return,
        };
        for node in nodes {
            node.invalidate_node();
        }
    }

    /// Mark only the context's active slot invalid
    pub fn invalidate_slot(&self, ctx: &RenderContext) -> Result<()> {
        let frame = ctx.require_surface_frame(SOURCE)?;
        lock(&self.state, SOURCE)?
            .cache
            .invalidate_slot(frame.surface, frame.active_index);
        Ok(())
    }

    pub fn is_valid(&self, surface: SurfaceId, slot: u32) -> bool {
        lock(&self.state, SOURCE)
            .map(|s| s.cache.is_valid(surface, slot))
            .unwrap_or(false)
    }

    /// Number of times the slot was (re)written
    pub fn build_count(&self, surface: SurfaceId, slot: u32) -> u32 {
        lock(&self.state, SOURCE)
            .map(|s| s.cache.build_count(surface, slot))
            .unwrap_or(0)
    }

    /// Native set of the context's active slot; `Error::NotValidated` before validate
    pub fn handle(&self, ctx: &RenderContext) -> Result<NativeHandle> {
        let frame = ctx.require_surface_frame(SOURCE)?;
        lock(&self.state, SOURCE)?.cache.handle(frame, "DescriptorSet")
    }

    /// Forget a surface, returning its native sets to the pool
    pub fn release_surface(&self, surface: SurfaceId) -> Result<()> {
        let pool = self.pool.clone();
        lock(&self.state, SOURCE)?
            .cache
            .remove_surface(surface, |device, set| pool.free(device, set));
        Ok(())
    }
}

impl Validatable for DescriptorSet {
    /// Validate layout, pool and resources, then (re)write the active slot if invalid
    fn validate(&self, ctx: &RenderContext) -> Result<()> {
        ctx.require_surface_frame(SOURCE)?;
        self.layout.validate(ctx)?;
        self.pool.validate(ctx)?;

        // Resources may invalidate this set while validating, so the state
        // lock is not held here.
        let descriptors: Vec<Arc<Descriptor>> =
            lock(&self.state, SOURCE)?.descriptors.values().cloned().collect();
        for descriptor in &descriptors {
            descriptor.validate(ctx)?;
        }

        let layout = self.layout.handle(ctx)?;
        let pool = &self.pool;
        let mut state = lock(&self.state, SOURCE)?;
        let DescriptorSetState { descriptors, cache, .. } = &mut *state;
        cache.validate_with(
            ctx,
            SOURCE,
            |device, previous| {
                let set = match previous {
                    Some(set) => set,
                    None => pool.allocate(device, layout)?,
                };
                let writes = descriptors
                    .values()
                    .map(|d| d.write(ctx))
                    .collect::<Result<Vec<DescriptorWrite>>>()?;
                device.update_descriptor_set(set, &writes)?;
                engine_trace!(SOURCE, "wrote {} bindings into {:?} for {}", writes.len(), set, ctx.key());
                Ok(set)
            },
            |device, old| pool.free(device, old),
        )?;
        Ok(())
    }

    fn invalidate(&self) {
        DescriptorSet::invalidate(self);
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        if let Ok(state) = self.state.get_mut() {
            for descriptor in state.descriptors.values() {
                descriptor.unregister();
            }
            state.cache.clear(|device, set| pool.free(device, set));
        }
    }
}
