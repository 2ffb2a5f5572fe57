use std::collections::HashMap;
use std::fmt::Write;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use hostflow_core::event::RunEvent;
use hostflow_core::types::{NodeId, NodeResult, NodeStatus, ResultStatus};
use hostflow_engine::validate::Finding;
use hostflow_engine::{ActionKind, ReportRecord, RunReport, StatusBoard, WorkflowGraph};

const PREVIEW: usize = 400;

/// One progress line for a live run event, if the event is worth showing.
pub fn progress_line(event: &RunEvent, host_name: &str) -> Option<String> {
    match event {
        RunEvent::BranchStarted { host_name, .. } => Some(format!("[{}] started", host_name)),
        RunEvent::NoTasks { host_name, .. } => {
            Some(format!("[{}] no tasks connected", host_name))
        }
        RunEvent::NodeStarted {
            node_id, target, ..
        } => Some(format!("[{}] node {}: {}", host_name, node_id, target)),
        RunEvent::NodeFinished {
            node_id, result, ..
        } => Some(format!(
            "[{}] node {} {}",
            host_name,
            node_id,
            outcome(result)
        )),
        RunEvent::Diagnostic { message, .. } => Some(format!("warning: {}", message)),
        _ => None,
    }
}

/// Emit progress lines until the run finishes or the bus closes.
///
/// Events dropped because the receiver fell behind are reported as one
/// warning line and the stream continues.
pub async fn follow_progress(mut rx: Receiver<RunEvent>, mut emit: impl FnMut(String)) {
    let mut hosts: HashMap<NodeId, String> = HashMap::new();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                emit(format!("warning: progress skipped {} event(s)", n));
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let branch = match &event {
            RunEvent::BranchStarted {
                branch, host_name, ..
            } => {
                hosts.insert(*branch, host_name.clone());
                *branch
            }
            RunEvent::NodeStarted { branch, .. } | RunEvent::NodeFinished { branch, .. } => *branch,
            RunEvent::RunFinished { .. } => break,
            _ => NodeId(0),
        };
        let host = hosts.get(&branch).map(String::as_str).unwrap_or("?");
        if let Some(line) = progress_line(&event, host) {
            emit(line);
        }
    }
}

fn outcome(result: &NodeResult) -> String {
    match (result.status, result.exit_code, result.error.as_deref()) {
        (ResultStatus::Success, _, _) => "ok".to_string(),
        (ResultStatus::Failure, _, Some(error)) => format!("failed: {}", error),
        (ResultStatus::Failure, Some(code), None) => format!("failed (exit {})", code),
        (ResultStatus::Failure, None, None) => "failed".to_string(),
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::Running => "running",
        NodeStatus::Success => "success",
        NodeStatus::Failure => "failure",
    }
}

fn preview(text: &str) -> String {
    let text = text.trim_end();
    match text.char_indices().nth(PREVIEW) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn write_record(out: &mut String, record: &ReportRecord) {
    let tag = match record.status {
        ResultStatus::Success => "ok",
        ResultStatus::Failure => "fail",
    };
    let action = match record.action {
        ActionKind::Command => "command",
        ActionKind::Upload => "upload",
    };
    let _ = write!(out, "  [{}] node {} {} `{}`", tag, record.node_id, action, record.target);
    if let Some(code) = record.exit_code {
        let _ = write!(out, " exit {}", code);
    }
    out.push('\n');
    for (label, text) in [
        ("stdout", record.stdout.as_deref()),
        ("stderr", record.stderr.as_deref()),
        ("error", record.error.as_deref()),
    ] {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            for (i, line) in preview(text).lines().enumerate() {
                let prefix = if i == 0 { label } else { "" };
                let _ = writeln!(out, "      {:>6} | {}", prefix, line);
            }
        }
    }
}

/// Human-readable summary of a finished run.
pub fn render_report(report: &RunReport, board: &StatusBoard, graph: &WorkflowGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run {}: {} succeeded, {} failed",
        report.run_id,
        report.succeeded(),
        report.failed()
    );

    for host in &report.hosts {
        let _ = write!(out, "\n{} (host {}): {}", host.host_name, host.host_id, status_label(host.status));
        if let Some(note) = &host.note {
            let _ = write!(out, " ({})", note);
        }
        out.push('\n');
        for record in report.records.iter().filter(|r| r.branch == host.branch) {
            write_record(&mut out, record);
        }
    }

    let outputs: Vec<NodeId> = graph
        .nodes()
        .filter(|n| n.is_output())
        .map(|n| n.id)
        .collect();
    if !outputs.is_empty() {
        out.push_str("\nOutputs:\n");
        for id in outputs {
            match board.output(id) {
                Some(shown) => {
                    let host = report
                        .host(shown.branch)
                        .map(|h| h.host_name.as_str())
                        .unwrap_or("?");
                    let _ = writeln!(
                        out,
                        "  node {} <- node {} on {}: {}",
                        id,
                        shown.source,
                        host,
                        outcome(&shown.result)
                    );
                    if let Some(stdout) = shown.result.stdout.as_deref().filter(|s| !s.is_empty()) {
                        for line in preview(stdout).lines() {
                            let _ = writeln!(out, "      | {}", line);
                        }
                    }
                }
                None => {
                    let _ = writeln!(out, "  node {}: (nothing to show)", id);
                }
            }
        }
    }

    if !report.diagnostics.is_empty() {
        out.push_str("\nDiagnostics:\n");
        for message in &report.diagnostics {
            let _ = writeln!(out, "  - {}", message);
        }
    }
    out
}

pub fn render_findings(findings: &[Finding]) -> String {
    let mut out = String::new();
    for finding in findings {
        match finding.node_id {
            Some(id) => {
                let _ = writeln!(out, "node {}: {}", id, finding.message);
            }
            None => {
                let _ = writeln!(out, "workflow: {}", finding.message);
            }
        }
    }
    out
}
