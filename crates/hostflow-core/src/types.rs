use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identifier of a node within one workflow graph. Always positive.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a managed host, owned by the host inventory.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u64);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The host a branch targets, as handed to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRef {
    pub id: HostId,
    pub name: String,
    pub address: String,
}

/// A local file bound to an upload node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHandle {
    /// File name as shown to the operator and used for default remote paths.
    pub name: String,
    /// Location of the file contents on this machine.
    pub path: PathBuf,
}

impl FileHandle {
    /// Bind a local path, taking the display name from its last component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }
}

/// What the gateway reports after running a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub exit_status: i32,
}

/// What the gateway reports after an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOutput {
    /// Effective path on the remote host after normalization.
    pub remote_path: String,
}

/// Terminal outcome of an executed action node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Outcome record of a command or upload node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeResult {
    /// Result of a completed command. Success iff the exit status is zero.
    pub fn from_command(output: CommandOutput) -> Self {
        let status = if output.exit_status == 0 {
            ResultStatus::Success
        } else {
            ResultStatus::Failure
        };
        Self {
            status,
            stdout: Some(output.output),
            stderr: Some(output.error),
            exit_code: Some(output.exit_status),
            path: None,
            error: None,
        }
    }

    /// Result of a completed upload.
    pub fn from_upload(output: UploadOutput) -> Self {
        Self {
            status: ResultStatus::Success,
            stdout: None,
            stderr: None,
            exit_code: None,
            path: Some(output.remote_path),
            error: None,
        }
    }

    /// Failure carrying only an error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failure,
            stdout: None,
            stderr: None,
            exit_code: None,
            path: None,
            error: Some(message.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Look up a field by the name templates use to reference it.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.as_str().to_string()),
            "stdout" | "output" => self.stdout.clone(),
            "stderr" => self.stderr.clone(),
            "exit_code" => self.exit_code.map(|c| c.to_string()),
            "path" => self.path.clone(),
            "error" | "message" => self.error.clone(),
            _ => None,
        }
    }
}

/// Lifecycle of one node instance (node id, branch) within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
}

impl From<ResultStatus> for NodeStatus {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Success => Self::Success,
            ResultStatus::Failure => Self::Failure,
        }
    }
}

/// A global variable as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub key: String,
    pub value: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

/// The service stores descriptions in a nullable column.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Listing entry for a named workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

/// A named workflow with its persisted graph record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// The persisted graph record as JSON.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
