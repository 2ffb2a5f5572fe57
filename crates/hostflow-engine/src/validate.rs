//! Pre-run checks that surface problems the scheduler would otherwise only
//! report as failed nodes. Nothing here blocks a run.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use hostflow_core::types::NodeId;

use crate::context::GlobalVariables;
use crate::graph::{NodeKind, WorkflowGraph};
use crate::resolver::{placeholders, Placeholder};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl Finding {
    fn at(node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            message: message.into(),
        }
    }
}

/// Inspect a graph and report likely mistakes.
///
/// `globals` is optional: without it, global references are not checked.
pub fn validate(graph: &WorkflowGraph, globals: Option<&GlobalVariables>) -> Vec<Finding> {
    let mut findings = Vec::new();

    if graph.hosts().next().is_none() {
        findings.push(Finding {
            node_id: None,
            message: "workflow has no host nodes".into(),
        });
    }

    let ref_names: HashSet<&str> = graph.nodes().filter_map(|n| n.ref_name()).collect();
    let reachable = reachable_from_hosts(graph);

    for node in graph.nodes() {
        let templates: Vec<&str> = match &node.kind {
            NodeKind::Host(_) => {
                if graph.outgoing(node.id).next().is_none() {
                    findings.push(Finding::at(node.id, "no tasks connected"));
                }
                continue;
            }
            NodeKind::Output => {
                if graph.incoming(node.id).next().is_none() {
                    findings.push(Finding::at(node.id, "output node has no input"));
                }
                continue;
            }
            NodeKind::Command(cmd) => {
                if cmd.command.trim().is_empty() {
                    findings.push(Finding::at(node.id, "command text is empty"));
                }
                vec![cmd.command.as_str()]
            }
            NodeKind::Upload(upload) => {
                if upload.source.is_none() {
                    let message = match &upload.file_name {
                        Some(name) => format!("file \"{}\" must be re-attached", name),
                        None => "no file attached".to_string(),
                    };
                    findings.push(Finding::at(node.id, message));
                }
                vec![upload.remote_path.as_str()]
            }
        };

        if !reachable.contains(&node.id) {
            findings.push(Finding::at(node.id, "not reachable from any host node"));
        }

        for template in templates {
            for placeholder in placeholders(template) {
                match placeholder {
                    Placeholder::Global(key) => {
                        if globals.is_some_and(|g| !g.contains(&key)) {
                            findings.push(Finding::at(
                                node.id,
                                format!("global variable \"{}\" is not defined", key),
                            ));
                        }
                    }
                    Placeholder::Result { ref_name, .. } => {
                        if !ref_names.contains(ref_name.as_str()) {
                            findings.push(Finding::at(
                                node.id,
                                format!("no node is named \"{}\"", ref_name),
                            ));
                        }
                    }
                    Placeholder::Unrecognized(raw) => {
                        findings.push(Finding::at(
                            node.id,
                            format!("placeholder \"{{{{{}}}}}\" is not a valid reference", raw),
                        ));
                    }
                }
            }
        }
    }

    findings
}

fn reachable_from_hosts(graph: &WorkflowGraph) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<NodeId> = graph.hosts().map(|(n, _)| n.id).collect();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        queue.extend(graph.outgoing(id).map(|e| e.to));
    }
    seen
}
