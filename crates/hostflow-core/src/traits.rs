use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Performs actions on managed hosts.
///
/// Implementations own transport, credentials, and timeouts. Any failure
/// (unreachable host, authentication, timeout) is reported as an `Err`.
/// A command that ran but exited non-zero is an `Ok` with its exit status.
pub trait RemoteGateway: Send + Sync + 'static {
    /// Gateway name for logs (e.g., "http", "local").
    fn name(&self) -> &str;

    /// Run a shell command on the host.
    fn execute_command<'a>(
        &'a self,
        host: &'a HostRef,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>>;

    /// Transfer a local file to the host. An empty `remote_path` lets the
    /// gateway pick a default location.
    fn upload_file<'a>(
        &'a self,
        host: &'a HostRef,
        file: &'a FileHandle,
        remote_path: &'a str,
    ) -> BoxFuture<'a, Result<UploadOutput>>;
}

/// Key/value pairs shared by all workflows.
pub trait GlobalStore: Send + Sync + 'static {
    /// List all variables, ordered by key.
    fn list(&self) -> BoxFuture<'_, Result<Vec<GlobalVariable>>>;

    /// Create or replace a variable.
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Remove a variable. Removing an absent key is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Persistence backend for named workflow records.
pub trait WorkflowStore: Send + Sync + 'static {
    /// List stored workflows, most recently updated first.
    fn list(&self) -> BoxFuture<'_, Result<Vec<WorkflowSummary>>>;

    /// Store a new workflow. Names are unique.
    fn create<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
        data: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<i64>>;

    /// Fetch a workflow by id.
    fn get(&self, id: i64) -> BoxFuture<'_, Result<Option<StoredWorkflow>>>;

    /// Replace the record and/or description of a workflow.
    fn update<'a>(
        &'a self,
        id: i64,
        data: Option<&'a serde_json::Value>,
        description: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Delete a workflow.
    fn delete(&self, id: i64) -> BoxFuture<'_, Result<()>>;
}
