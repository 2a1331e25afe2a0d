/// Scene/command graph nodes
///
/// The scene graph itself lives outside this crate. Pipelines take part in
/// it through `accept`, and anything that records commands registers with
/// the descriptor sets and pipelines it binds so it is told to re-record
/// when they change.

use std::sync::{Arc, Mutex, Weak};
use crate::frame::CommandBufferSlots;
use crate::pipeline::{ComputePipeline, GraphicsPipeline};

/// Visitor over engine nodes; traversal order is the caller's business
pub trait NodeVisitor {
    fn visit_graphics_pipeline(&mut self, _pipeline: &GraphicsPipeline) {}

    fn visit_compute_pipeline(&mut self, _pipeline: &ComputePipeline) {}

    fn visit_command_slots(&mut self, _slots: &CommandBufferSlots) {}
}

/// Node of the scene/command graph
pub trait Node: Send + Sync {
    fn accept(&self, visitor: &mut dyn NodeVisitor);

    /// Something this node was built against changed
    ///
    /// Recording nodes mark their command buffers for re-recording. The
    /// default does nothing.
    fn invalidate_node(&self) {}
}

/// Weakly held consumer nodes of a pipeline
///
/// Dropped nodes are pruned on the next notification.
#[derive(Default)]
pub struct NodeList {
    nodes: Mutex<Vec<Weak<dyn Node>>>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node`; adding it twice keeps one entry
    pub fn add(&self, node: &Arc<dyn Node>) {
        if let Ok(mut nodes) = self.nodes.lock() {
            let weak = Arc::downgrade(node);
            if !nodes.iter().any(|n| n.ptr_eq(&weak)) {
                nodes.push(weak);
            }
        }
    }

    pub fn remove(&self, node: &Arc<dyn Node>) {
        if let Ok(mut nodes) = self.nodes.lock() {
            let weak = Arc::downgrade(node);
            nodes.retain(|n| !n.ptr_eq(&weak));
        }
    }

    /// Live nodes
    pub fn len(&self) -> usize {
        self.nodes
            .lock()
            .map(|nodes| nodes.iter().filter(|n| n.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `invalidate_node` on every live node, outside the list's lock
    pub fn notify(&self) {
        let live: Vec<Arc<dyn Node>> = match self.nodes.lock() {
            Ok(mut nodes) => {
                nodes.retain(|n| n.strong_count() > 0);
                nodes.iter().filter_map(|n| n.upgrade()).collect()
            }
            Err(_) => return,
        };
        for node in live {
            node.invalidate_node();
        }
    }
}
