//! Hostflow workflow engine.
//!
//! Turns a workflow graph plus a remote gateway into per-node results:
//! - [`graph`]: nodes, conditional edges, and the persisted record format;
//! - [`resolver`]: `{{ ... }}` placeholder substitution;
//! - [`executor`]: the concurrent branch scheduler;
//! - [`report`] and [`status`]: what a run leaves behind and what it shows
//!   while in flight.

pub mod context;
pub mod executor;
pub mod graph;
pub mod report;
pub mod resolver;
pub mod run_log;
pub mod status;
pub mod validate;

pub use context::{ExecutionContext, GlobalVariables};
pub use executor::WorkflowExecutor;
pub use graph::{
    CommandNode, Edge, EdgeCondition, HostNode, Node, NodeKind, Position, UploadNode,
    WorkflowGraph, WorkflowRecord,
};
pub use report::{ActionKind, HostSummary, ReportAggregator, ReportRecord, RunReport};
pub use resolver::{placeholders, resolve, Placeholder};
pub use run_log::RunLogger;
pub use status::{OutputDisplay, StatusBoard};
pub use validate::{validate, Finding};
