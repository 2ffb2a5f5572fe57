use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Error)]
pub enum HostflowError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Node configuration errors (surfaced at run time, never at build time)
    #[error("Node {node} is misconfigured: {message}")]
    Configuration { node: NodeId, message: String },

    // Remote action errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Gateway timeout after {timeout_secs}s: {action}")]
    GatewayTimeout { action: String, timeout_secs: u64 },

    // Graph structure errors
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Edge {from} -> {to} references an unknown node")]
    DanglingEdge { from: NodeId, to: NodeId },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Invalid node id: {0} (ids must be between 1 and 2^53 - 1)")]
    InvalidNodeId(u64),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HostflowError>;
