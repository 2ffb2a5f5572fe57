use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use hostflow_core::types::{NodeId, NodeResult, NodeStatus};

/// What an output node currently displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDisplay {
    pub branch: NodeId,
    /// The action node whose result is shown.
    pub source: NodeId,
    pub result: NodeResult,
}

#[derive(Debug, Default)]
struct BoardState {
    /// Keyed by (branch, node).
    nodes: HashMap<(NodeId, NodeId), NodeStatus>,
    hosts: HashMap<NodeId, NodeStatus>,
    outputs: HashMap<NodeId, OutputDisplay>,
}

/// Live status of every node instance in the current run.
///
/// This is the only state the scheduler mutates while a run is in flight;
/// the graph itself stays untouched. Instances never touched read as
/// `Pending`.
#[derive(Debug, Default)]
pub struct StatusBoard {
    state: Mutex<BoardState>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget everything from the previous run.
    pub fn reset(&self) {
        *self.lock() = BoardState::default();
    }

    pub fn set_node(&self, branch: NodeId, node: NodeId, status: NodeStatus) {
        self.lock().nodes.insert((branch, node), status);
    }

    pub fn node_status(&self, branch: NodeId, node: NodeId) -> NodeStatus {
        self.lock()
            .nodes
            .get(&(branch, node))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_host(&self, branch: NodeId, status: NodeStatus) {
        self.lock().hosts.insert(branch, status);
    }

    pub fn host_status(&self, branch: NodeId) -> NodeStatus {
        self.lock().hosts.get(&branch).copied().unwrap_or_default()
    }

    /// Show `result` on an output node, replacing whatever it showed before.
    pub fn show_output(&self, output: NodeId, display: OutputDisplay) {
        self.lock().outputs.insert(output, display);
    }

    pub fn output(&self, output: NodeId) -> Option<OutputDisplay> {
        self.lock().outputs.get(&output).cloned()
    }

    /// Number of node instances that reached `status`.
    pub fn count(&self, status: NodeStatus) -> usize {
        self.lock().nodes.values().filter(|s| **s == status).count()
    }
}
