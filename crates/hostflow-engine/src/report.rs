use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use hostflow_core::types::{HostId, NodeId, NodeResult, NodeStatus, ResultStatus, RunId};

/// Kind of remote action a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Command,
    Upload,
}

/// Display-ready outcome of one executed action node.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub branch: NodeId,
    pub host_id: HostId,
    pub host_name: String,
    pub node_id: NodeId,
    pub action: ActionKind,
    /// Resolved command text or remote path.
    pub target: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn new(
        host: (NodeId, HostId, &str),
        node_id: NodeId,
        action: ActionKind,
        target: impl Into<String>,
        result: &NodeResult,
    ) -> Self {
        let (branch, host_id, host_name) = host;
        Self {
            branch,
            host_id,
            host_name: host_name.to_string(),
            node_id,
            action,
            target: target.into(),
            status: result.status,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            error: result.error.clone(),
            finished_at: Utc::now(),
        }
    }
}

/// Final state of one host branch.
#[derive(Debug, Clone, Serialize)]
pub struct HostSummary {
    pub branch: NodeId,
    pub host_id: HostId,
    pub host_name: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Everything a run produced that outlives the run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// In completion order, not graph order.
    pub records: Vec<ReportRecord>,
    pub hosts: Vec<HostSummary>,
    pub diagnostics: Vec<String>,
}

impl RunReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            records: Vec::new(),
            hosts: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == ResultStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == ResultStatus::Failure)
            .count()
    }

    /// Records produced by one node, across all branches.
    pub fn records_for(&self, node_id: NodeId) -> impl Iterator<Item = &ReportRecord> + '_ {
        self.records.iter().filter(move |r| r.node_id == node_id)
    }

    pub fn host(&self, branch: NodeId) -> Option<&HostSummary> {
        self.hosts.iter().find(|h| h.branch == branch)
    }
}

/// Collects the report for the current run.
///
/// Append-only during a run; `reset` starts a new one.
pub struct ReportAggregator {
    report: Mutex<RunReport>,
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self {
            report: Mutex::new(RunReport::new(RunId::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunReport> {
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self, run_id: RunId) {
        *self.lock() = RunReport::new(run_id);
    }

    pub fn record(&self, record: ReportRecord) {
        self.lock().records.push(record);
    }

    pub fn diagnostic(&self, message: impl Into<String>) {
        self.lock().diagnostics.push(message.into());
    }

    /// Insert or replace the summary of a host branch.
    pub fn set_host(&self, summary: HostSummary) {
        let mut report = self.lock();
        match report.hosts.iter_mut().find(|h| h.branch == summary.branch) {
            Some(existing) => *existing = summary,
            None => report.hosts.push(summary),
        }
    }

    pub fn finish(&self) {
        self.lock().finished_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> RunReport {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
