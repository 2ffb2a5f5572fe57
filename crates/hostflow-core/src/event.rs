use serde::Serialize;

use crate::types::{HostId, NodeId, NodeResult, RunId};

/// Lifecycle events published while a workflow runs.
///
/// `branch` is always the id of the host node that roots the branch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run started.
    RunStarted { run_id: RunId, hosts: usize },
    /// A host branch started executing its successors.
    BranchStarted { branch: NodeId, host_id: HostId, host_name: String },
    /// A host node had nothing connected to it.
    NoTasks { branch: NodeId, host_name: String },
    /// A node instance started.
    NodeStarted { branch: NodeId, node_id: NodeId, target: String },
    /// A node instance reached a terminal state.
    NodeFinished { branch: NodeId, node_id: NodeId, result: NodeResult },
    /// An output node now displays the result of `source`.
    OutputUpdated { branch: NodeId, output_id: NodeId, source: NodeId, result: NodeResult },
    /// A non-fatal observation worth surfacing to the operator.
    Diagnostic { branch: Option<NodeId>, message: String },
    /// Every subtree of a branch has terminated.
    BranchFinished { branch: NodeId },
    /// Every branch has terminated.
    RunFinished { run_id: RunId, succeeded: usize, failed: usize },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RunEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
