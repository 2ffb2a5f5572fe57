//! Workflow graph model.
//!
//! A workflow is a directed graph of `Node`s connected by conditional `Edge`s.
//! Host nodes root branches; command and upload nodes perform remote actions
//! on the branch's host; output nodes display results. Edges fire
//! unconditionally (`Default`) or depending on the source node's outcome
//! (`OnSuccess`, `OnFailure`).
//!
//! `WorkflowRecord` converts graphs to and from their persisted JSON form.

pub mod edge;
pub mod node;
pub mod record;
pub mod workflow;

pub use edge::{Edge, EdgeCondition};
pub use node::{CommandNode, HostNode, Node, NodeKind, Position, UploadNode};
pub use record::WorkflowRecord;
pub use workflow::{WorkflowGraph, MAX_NODE_ID};
