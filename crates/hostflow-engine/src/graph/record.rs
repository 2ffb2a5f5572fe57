//! Persisted representation of a workflow graph.
//!
//! The JSON layout is shared with the canvas and the workflow store:
//! `{ nodes: [...], connections: [{from, to, type}], nextNodeId }`.
//! File contents of upload nodes are never embedded; only the file name is
//! kept and the node must be re-attached before it can run.

use serde::{Deserialize, Deserializer, Serialize};

use hostflow_core::error::Result;
use hostflow_core::types::{HostId, NodeId};

use super::edge::{Edge, EdgeCondition};
use super::node::{CommandNode, HostNode, Node, NodeKind, Position, UploadNode};
use super::workflow::WorkflowGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default)]
    pub next_node_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeRecord {
    Server(ServerRecord),
    Command(CommandRecord),
    Upload(UploadRecord),
    Output(OutputRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub server_id: u64,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub server_host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub id: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub upload: UploadSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSpec {
    #[serde(default)]
    pub remote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub from: u64,
    pub to: u64,
    #[serde(rename = "type", default)]
    pub condition: EdgeCondition,
}

/// Host ids arrive as numbers from saved files but as strings from the canvas.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Blank ref names from the canvas mean "no ref name".
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl NodeRecord {
    pub fn id(&self) -> u64 {
        match self {
            Self::Server(r) => r.id,
            Self::Command(r) => r.id,
            Self::Upload(r) => r.id,
            Self::Output(r) => r.id,
        }
    }

    fn from_node(node: &Node) -> Self {
        let id = node.id.0;
        let Position { x, y } = node.position;
        match &node.kind {
            NodeKind::Host(h) => Self::Server(ServerRecord {
                id,
                x,
                y,
                server_id: h.host_id.0,
                server_name: h.host_name.clone(),
                server_host: h.host_address.clone(),
            }),
            NodeKind::Command(c) => Self::Command(CommandRecord {
                id,
                x,
                y,
                command: c.command.clone(),
                title: c.title.clone(),
                description: c.description.clone(),
                ref_name: c.ref_name.clone(),
            }),
            NodeKind::Upload(u) => Self::Upload(UploadRecord {
                id,
                x,
                y,
                upload: UploadSpec {
                    remote: u.remote_path.clone(),
                    file_name: u.file_name.clone(),
                },
                ref_name: u.ref_name.clone(),
            }),
            NodeKind::Output => Self::Output(OutputRecord { id, x, y }),
        }
    }

    fn into_node(self) -> Node {
        match self {
            Self::Server(r) => Node {
                id: NodeId(r.id),
                position: Position::new(r.x, r.y),
                kind: NodeKind::Host(HostNode {
                    host_id: HostId(r.server_id),
                    host_name: r.server_name,
                    host_address: r.server_host,
                }),
            },
            Self::Command(r) => Node {
                id: NodeId(r.id),
                position: Position::new(r.x, r.y),
                kind: NodeKind::Command(CommandNode {
                    command: r.command,
                    title: r.title,
                    description: r.description,
                    ref_name: non_blank(r.ref_name),
                }),
            },
            Self::Upload(r) => Node {
                id: NodeId(r.id),
                position: Position::new(r.x, r.y),
                kind: NodeKind::Upload(UploadNode {
                    source: None,
                    file_name: non_blank(r.upload.file_name),
                    remote_path: r.upload.remote,
                    ref_name: non_blank(r.ref_name),
                }),
            },
            Self::Output(r) => Node {
                id: NodeId(r.id),
                position: Position::new(r.x, r.y),
                kind: NodeKind::Output,
            },
        }
    }
}

impl WorkflowRecord {
    /// Capture a graph for storage. Bound upload files are dropped.
    pub fn from_graph(graph: &WorkflowGraph) -> Self {
        Self {
            nodes: graph.nodes().map(NodeRecord::from_node).collect(),
            connections: graph
                .edges()
                .iter()
                .map(|e| ConnectionRecord {
                    from: e.from.0,
                    to: e.to.0,
                    condition: e.condition,
                })
                .collect(),
            next_node_id: graph.next_id(),
        }
    }

    /// Rebuild the graph, rejecting connections to unknown nodes.
    pub fn into_graph(self) -> Result<WorkflowGraph> {
        let (nodes, edges, next) = self.into_parts();
        WorkflowGraph::from_parts(nodes, edges, next)
    }

    /// Rebuild the graph, dropping connections to unknown nodes.
    pub fn into_graph_lenient(self) -> Result<WorkflowGraph> {
        let (nodes, edges, next) = self.into_parts();
        WorkflowGraph::from_parts_lenient(nodes, edges, next)
    }

    fn into_parts(self) -> (Vec<Node>, Vec<Edge>, u64) {
        let nodes = self.nodes.into_iter().map(NodeRecord::into_node).collect();
        let edges = self
            .connections
            .into_iter()
            .map(|c| Edge {
                from: NodeId(c.from),
                to: NodeId(c.to),
                condition: c.condition,
            })
            .collect();
        (nodes, edges, self.next_node_id)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
