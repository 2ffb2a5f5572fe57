use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::future::{join_all, BoxFuture};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use hostflow_core::config::{EngineConfig, Reentry};
use hostflow_core::error::{HostflowError, Result};
use hostflow_core::event::{EventBus, RunEvent};
use hostflow_core::traits::{GlobalStore, RemoteGateway};
use hostflow_core::types::{HostId, HostRef, NodeId, NodeResult, NodeStatus, RunId};

use crate::context::{ExecutionContext, GlobalVariables};
use crate::graph::{Node, NodeKind, UploadNode, WorkflowGraph};
use crate::report::{ActionKind, HostSummary, ReportAggregator, ReportRecord, RunReport};
use crate::resolver::resolve;
use crate::status::{OutputDisplay, StatusBoard};

const NO_TASKS: &str = "no tasks connected";

/// Runs workflow graphs against a remote gateway.
///
/// Every host node roots an independent branch. All branches run
/// concurrently; within a branch, every set of simultaneously eligible
/// successors is launched together and awaited as a unit. A node failure
/// only changes which conditional edges fire: it never aborts its branch or
/// any other branch.
///
/// One run at a time: the status board and report belong to the current run
/// and are reset when the next one starts.
pub struct WorkflowExecutor {
    gateway: Arc<dyn RemoteGateway>,
    globals: Option<Arc<dyn GlobalStore>>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    board: Arc<StatusBoard>,
    report: Arc<ReportAggregator>,
    run_lock: tokio::sync::Mutex<()>,
}

/// Per-branch state shared by every node instance of that branch.
struct Branch<'a> {
    root: NodeId,
    host: HostRef,
    graph: &'a WorkflowGraph,
    globals: &'a GlobalVariables,
    context: RwLock<ExecutionContext>,
    visits: Mutex<HashMap<NodeId, usize>>,
}

/// Whether a node instance may start.
enum Admission {
    Enter,
    AlreadyEntered,
    VisitCap,
}

impl Branch<'_> {
    fn admit(&self, id: NodeId, reentry: Reentry, max_visits: usize) -> Admission {
        let mut visits = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        let count = visits.entry(id).or_insert(0);
        match reentry {
            Reentry::Once if *count > 0 => Admission::AlreadyEntered,
            Reentry::PerPath if *count >= max_visits => Admission::VisitCap,
            _ => {
                *count += 1;
                Admission::Enter
            }
        }
    }

    fn host_key(&self) -> (NodeId, HostId, &str) {
        (self.root, self.host.id, self.host.name.as_str())
    }
}

impl WorkflowExecutor {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            gateway,
            globals: None,
            config: EngineConfig::default(),
            event_bus: Arc::new(EventBus::default()),
            board: Arc::new(StatusBoard::new()),
            report: Arc::new(ReportAggregator::new()),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Read global variables from `store` at the start of every run.
    pub fn with_globals(mut self, store: Arc<dyn GlobalStore>) -> Self {
        self.globals = Some(store);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish run events on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    pub fn report(&self) -> &Arc<ReportAggregator> {
        &self.report
    }

    /// Run every branch of `graph`, loading globals from the configured store.
    ///
    /// A failing global store does not stop the run: placeholders that
    /// reference globals are then simply left unresolved.
    pub async fn execute(&self, graph: &WorkflowGraph) -> RunReport {
        let mut note = None;
        let globals = match &self.globals {
            Some(store) => match store.list().await {
                Ok(vars) => GlobalVariables::from(vars),
                Err(e) => {
                    warn!(error = %e, "Failed to load global variables, continuing without them");
                    note = Some(format!("global variables unavailable: {}", e));
                    GlobalVariables::new()
                }
            },
            None => GlobalVariables::new(),
        };
        self.run(graph, globals, note).await
    }

    /// Run every branch of `graph` with an already loaded set of globals.
    pub async fn execute_with_globals(
        &self,
        graph: &WorkflowGraph,
        globals: GlobalVariables,
    ) -> RunReport {
        self.run(graph, globals, None).await
    }

    async fn run(
        &self,
        graph: &WorkflowGraph,
        globals: GlobalVariables,
        note: Option<String>,
    ) -> RunReport {
        let _guard = self.run_lock.lock().await;
        let start = Instant::now();
        let run_id = RunId::new();

        self.report.reset(run_id.clone());
        self.board.reset();

        let hosts: Vec<(&Node, HostRef)> = graph
            .hosts()
            .map(|(node, host)| (node, host.host_ref()))
            .collect();

        info!(
            run_id = %run_id,
            hosts = hosts.len(),
            globals = globals.len(),
            "Starting workflow run"
        );
        self.event_bus.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            hosts: hosts.len(),
        });

        if let Some(note) = note {
            self.diagnostic(None, note);
        }
        if hosts.is_empty() {
            self.diagnostic(None, "workflow has no host nodes");
        }

        let branches = hosts
            .into_iter()
            .map(|(node, host)| self.run_branch(graph, &globals, node.id, host));
        join_all(branches).await;

        self.report.finish();
        let report = self.report.snapshot();
        info!(
            run_id = %run_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow run complete"
        );
        self.event_bus.publish(RunEvent::RunFinished {
            run_id,
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        report
    }

    async fn run_branch(
        &self,
        graph: &WorkflowGraph,
        globals: &GlobalVariables,
        root: NodeId,
        host: HostRef,
    ) {
        let edges: Vec<NodeId> = graph.outgoing(root).map(|e| e.to).collect();
        let mut summary = HostSummary {
            branch: root,
            host_id: host.id,
            host_name: host.name.clone(),
            status: NodeStatus::Pending,
            note: None,
        };

        if edges.is_empty() {
            warn!(host = %host.name, node_id = %root, "Host has no tasks connected");
            summary.note = Some(NO_TASKS.to_string());
            self.report.set_host(summary);
            self.report
                .diagnostic(format!("{}: {}", host.name, NO_TASKS));
            self.event_bus.publish(RunEvent::NoTasks {
                branch: root,
                host_name: host.name,
            });
            return;
        }

        info!(host = %host.name, node_id = %root, tasks = edges.len(), "Starting branch");
        self.board.set_host(root, NodeStatus::Running);
        summary.status = NodeStatus::Running;
        self.report.set_host(summary.clone());
        self.event_bus.publish(RunEvent::BranchStarted {
            branch: root,
            host_id: host.id,
            host_name: host.name.clone(),
        });

        let branch = Branch {
            root,
            host,
            graph,
            globals,
            context: RwLock::new(ExecutionContext::new()),
            visits: Mutex::new(HashMap::new()),
        };

        // A host has no outcome, so every edge out of it fires.
        let targets: Vec<NodeId> = edges
            .into_iter()
            .filter(|id| self.schedulable(&branch, *id))
            .collect();
        join_all(targets.into_iter().map(|id| self.execute_node(&branch, id))).await;

        self.board.set_host(root, NodeStatus::Success);
        summary.status = NodeStatus::Success;
        self.report.set_host(summary);
        debug!(host = %branch.host.name, "Branch complete");
        self.event_bus.publish(RunEvent::BranchFinished { branch: root });
    }

    /// Only command and upload nodes are ever executed.
    fn schedulable(&self, branch: &Branch<'_>, id: NodeId) -> bool {
        match branch.graph.node(id).map(|n| &n.kind) {
            Some(NodeKind::Command(_)) | Some(NodeKind::Upload(_)) => true,
            Some(NodeKind::Output) => false,
            Some(NodeKind::Host(_)) => {
                debug!(node_id = %id, "Edge into another host node is not followed");
                false
            }
            None => {
                warn!(node_id = %id, "Edge target not found in graph");
                false
            }
        }
    }

    /// Execute one node instance, then its selected successors.
    ///
    /// Output nodes follow the same edge conditions as action nodes: a
    /// success-only edge into an output does not show a failed result.
    /// Returns only when every launched successor subtree has terminated.
    fn execute_node<'a>(&'a self, branch: &'a Branch<'a>, id: NodeId) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(node) = branch.graph.node(id) else {
                return;
            };

            match branch.admit(id, self.config.reentry, self.config.max_node_visits) {
                Admission::Enter => {}
                Admission::AlreadyEntered => {
                    debug!(node_id = %id, branch = %branch.root, "Node already entered in this branch");
                    return;
                }
                Admission::VisitCap => {
                    self.diagnostic(
                        Some(branch.root),
                        format!(
                            "node {} reached the limit of {} executions on {}; path stopped",
                            id, self.config.max_node_visits, branch.host.name
                        ),
                    );
                    return;
                }
            }

            self.board.set_node(branch.root, id, NodeStatus::Running);

            let (action, target, result) = match &node.kind {
                NodeKind::Command(cmd) => {
                    let command = self.resolve_in(branch, &cmd.command).await;
                    self.started(branch, id, &command);
                    let result = self.run_command(branch, id, &command).await;
                    (ActionKind::Command, command, result)
                }
                NodeKind::Upload(upload) => {
                    let remote_path = self.resolve_in(branch, &upload.remote_path).await;
                    self.started(branch, id, &remote_path);
                    let result = self.run_upload(branch, id, upload, &remote_path).await;
                    (ActionKind::Upload, remote_path, result)
                }
                NodeKind::Host(_) | NodeKind::Output => return,
            };

            if let Some(name) = node.ref_name() {
                branch.context.write().await.insert(name, result.clone());
            }

            self.board.set_node(branch.root, id, result.status.into());
            self.report.record(ReportRecord::new(
                branch.host_key(),
                id,
                action,
                target,
                &result,
            ));
            debug!(
                node_id = %id,
                host = %branch.host.name,
                status = result.status.as_str(),
                "Node finished"
            );
            self.event_bus.publish(RunEvent::NodeFinished {
                branch: branch.root,
                node_id: id,
                result: result.clone(),
            });

            let mut next = Vec::new();
            for edge in branch.graph.outgoing(id) {
                if !edge.condition.admits(result.status) {
                    continue;
                }
                match branch.graph.node(edge.to).map(|n| &n.kind) {
                    Some(NodeKind::Output) => self.show_output(branch, edge.to, id, &result),
                    _ if self.schedulable(branch, edge.to) => next.push(edge.to),
                    _ => {}
                }
            }

            join_all(next.into_iter().map(|to| self.execute_node(branch, to))).await;
        })
    }

    async fn resolve_in(&self, branch: &Branch<'_>, template: &str) -> String {
        let context = branch.context.read().await;
        resolve(template, &context, branch.globals)
    }

    fn started(&self, branch: &Branch<'_>, id: NodeId, target: &str) {
        info!(node_id = %id, host = %branch.host.name, target = %target, "Executing node");
        self.event_bus.publish(RunEvent::NodeStarted {
            branch: branch.root,
            node_id: id,
            target: target.to_string(),
        });
    }

    async fn run_command(&self, branch: &Branch<'_>, id: NodeId, command: &str) -> NodeResult {
        let outcome = self.try_command(branch, id, command).await;
        self.contain(branch, id, outcome)
    }

    async fn try_command(&self, branch: &Branch<'_>, id: NodeId, command: &str) -> Result<NodeResult> {
        if command.trim().is_empty() {
            return Err(HostflowError::Configuration {
                node: id,
                message: "command text is empty".into(),
            });
        }
        let output = self.gateway.execute_command(&branch.host, command).await?;
        Ok(NodeResult::from_command(output))
    }

    async fn run_upload(
        &self,
        branch: &Branch<'_>,
        id: NodeId,
        node: &UploadNode,
        remote_path: &str,
    ) -> NodeResult {
        let outcome = self.try_upload(branch, id, node, remote_path).await;
        self.contain(branch, id, outcome)
    }

    async fn try_upload(
        &self,
        branch: &Branch<'_>,
        id: NodeId,
        node: &UploadNode,
        remote_path: &str,
    ) -> Result<NodeResult> {
        let Some(file) = &node.source else {
            let message = match &node.file_name {
                Some(name) => format!("file \"{}\" must be re-attached before running", name),
                None => "no file attached".to_string(),
            };
            return Err(HostflowError::Configuration { node: id, message });
        };
        let output = self
            .gateway
            .upload_file(&branch.host, file, remote_path)
            .await?;
        Ok(NodeResult::from_upload(output))
    }

    /// Turn any error into a failed result so it never leaves the node.
    fn contain(&self, branch: &Branch<'_>, id: NodeId, outcome: Result<NodeResult>) -> NodeResult {
        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    node_id = %id,
                    host = %branch.host.name,
                    gateway = self.gateway.name(),
                    error = %e,
                    "Node failed"
                );
                NodeResult::failure(e.to_string())
            }
        }
    }

    fn show_output(&self, branch: &Branch<'_>, output: NodeId, source: NodeId, result: &NodeResult) {
        self.board.show_output(
            output,
            OutputDisplay {
                branch: branch.root,
                source,
                result: result.clone(),
            },
        );
        self.event_bus.publish(RunEvent::OutputUpdated {
            branch: branch.root,
            output_id: output,
            source,
            result: result.clone(),
        });
    }

    fn diagnostic(&self, branch: Option<NodeId>, message: impl Into<String>) {
        let message = message.into();
        warn!(message = %message, "Run diagnostic");
        self.report.diagnostic(message.clone());
        self.event_bus.publish(RunEvent::Diagnostic { branch, message });
    }
}
