use std::sync::Arc;
use std::time::Duration;

use hostflow_core::config::{EngineConfig, Reentry};
use hostflow_core::event::RunEvent;
use hostflow_core::types::{FileHandle, HostId, NodeId, NodeStatus, ResultStatus};
use hostflow_engine::{
    CommandNode, EdgeCondition, GlobalVariables, HostNode, Position, UploadNode, WorkflowExecutor,
    WorkflowGraph,
};
use hostflow_test_utils::{FailingGlobalStore, GatewayCall, MemoryGlobalStore, MockGateway, Reply};

fn host(id: u64, name: &str) -> HostNode {
    HostNode {
        host_id: HostId(id),
        host_name: name.into(),
        host_address: format!("10.0.0.{}", id),
    }
}

fn at() -> Position {
    Position::default()
}

fn command(graph: &mut WorkflowGraph, text: &str) -> NodeId {
    graph.add_command(CommandNode::new(text), at())
}

fn named(graph: &mut WorkflowGraph, text: &str, ref_name: &str) -> NodeId {
    graph.add_command(CommandNode::new(text).with_ref(ref_name), at())
}

fn link(graph: &mut WorkflowGraph, from: NodeId, to: NodeId, condition: EdgeCondition) {
    graph.connect(from, to, condition).unwrap();
}

fn executor(gw: &Arc<MockGateway>) -> WorkflowExecutor {
    WorkflowExecutor::new(gw.clone())
}

#[tokio::test]
async fn host_without_tasks_produces_no_results() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let gw = Arc::new(MockGateway::new());

    let report = executor(&gw).execute(&g).await;

    assert!(report.records.is_empty());
    assert_eq!(gw.call_count(), 0);
    let summary = report.host(h).unwrap();
    assert_eq!(summary.status, NodeStatus::Pending);
    assert_eq!(summary.note.as_deref(), Some("no tasks connected"));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d == "web-1: no tasks connected"));
}

#[tokio::test]
async fn empty_workflow_reports_missing_hosts() {
    let mut g = WorkflowGraph::new();
    command(&mut g, "uptime");
    let gw = Arc::new(MockGateway::new());

    let report = executor(&gw).execute(&g).await;

    assert!(report.records.is_empty());
    assert!(report.diagnostics.iter().any(|d| d.contains("no host nodes")));
}

#[tokio::test]
async fn globals_and_prior_results_feed_later_commands() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = named(&mut g, "echo {{global.msg}}", "greet");
    let c2 = command(&mut g, "echo {{greet.stdout}}");
    link(&mut g, h, c1, EdgeCondition::Default);
    link(&mut g, c1, c2, EdgeCondition::OnSuccess);

    let gw = Arc::new(MockGateway::new());
    let store = Arc::new(MemoryGlobalStore::new().with("msg", "hi"));
    let report = executor(&gw).with_globals(store).execute(&g).await;

    assert_eq!(gw.commands_for("web-1"), vec!["echo hi", "echo hi\n"]);
    assert_eq!(report.succeeded(), 2);
    let first = report.records_for(c1).next().unwrap();
    assert_eq!(first.stdout.as_deref(), Some("hi\n"));
    assert_eq!(first.exit_code, Some(0));
}

#[tokio::test]
async fn failure_follows_failure_edges_only() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "systemctl restart app");
    let out = g.add_output(at());
    let c3 = command(&mut g, "curl localhost");
    link(&mut g, h, c1, EdgeCondition::Default);
    link(&mut g, c1, out, EdgeCondition::OnFailure);
    link(&mut g, c1, c3, EdgeCondition::OnSuccess);

    let gw = Arc::new(MockGateway::new().on("systemctl restart app", Reply::exit(1, "denied")));
    let exec = executor(&gw);
    let report = exec.execute(&g).await;

    let shown = exec.board().output(out).unwrap();
    assert_eq!(shown.source, c1);
    assert_eq!(shown.result.status, ResultStatus::Failure);
    assert_eq!(shown.result.exit_code, Some(1));
    assert_eq!(shown.result.stderr.as_deref(), Some("denied"));

    assert_eq!(exec.board().node_status(h, c1), NodeStatus::Failure);
    assert_eq!(exec.board().node_status(h, c3), NodeStatus::Pending);
    assert_eq!(gw.commands_for("web-1"), vec!["systemctl restart app"]);
    assert_eq!(report.failed(), 1);
    // The branch itself completes normally.
    assert_eq!(report.host(h).unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn output_not_updated_when_condition_rejects() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "uptime");
    let out = g.add_output(at());
    link(&mut g, h, c1, EdgeCondition::Default);
    link(&mut g, c1, out, EdgeCondition::OnFailure);

    let gw = Arc::new(MockGateway::new());
    let exec = executor(&gw);
    exec.execute(&g).await;

    assert!(exec.board().output(out).is_none());
}

#[tokio::test]
async fn gateway_error_becomes_failed_result() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "uptime");
    let rescue = command(&mut g, "echo rescue");
    link(&mut g, h, c1, EdgeCondition::Default);
    link(&mut g, c1, rescue, EdgeCondition::OnFailure);

    let gw = Arc::new(MockGateway::new().on("uptime", Reply::error("host unreachable")));
    let report = executor(&gw).execute(&g).await;

    let failed = report.records_for(c1).next().unwrap();
    assert_eq!(failed.status, ResultStatus::Failure);
    assert!(failed.error.as_deref().unwrap().contains("host unreachable"));
    assert_eq!(failed.exit_code, None);
    assert_eq!(gw.commands_for("web-1"), vec!["uptime", "echo rescue"]);
}

#[tokio::test]
async fn default_edge_fires_after_failure() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "false");
    let cleanup = command(&mut g, "rm -rf /tmp/stage");
    let skipped = command(&mut g, "echo deployed");
    link(&mut g, h, c1, EdgeCondition::Default);
    link(&mut g, c1, cleanup, EdgeCondition::Default);
    link(&mut g, c1, skipped, EdgeCondition::OnSuccess);

    let gw = Arc::new(MockGateway::new().on("false", Reply::exit(1, "")));
    let exec = executor(&gw);
    let report = exec.execute(&g).await;

    assert_eq!(gw.commands_for("web-1"), vec!["false", "rm -rf /tmp/stage"]);
    assert_eq!(report.records_for(c1).next().unwrap().status, ResultStatus::Failure);
    assert_eq!(report.records_for(cleanup).next().unwrap().status, ResultStatus::Success);
    assert_eq!(exec.board().node_status(h, cleanup), NodeStatus::Success);
    assert_eq!(exec.board().node_status(h, skipped), NodeStatus::Pending);
}

#[tokio::test]
async fn empty_command_fails_without_calling_gateway() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "   ");
    link(&mut g, h, c1, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let report = executor(&gw).execute(&g).await;

    assert_eq!(gw.call_count(), 0);
    let record = report.records_for(c1).next().unwrap();
    assert!(record.error.as_deref().unwrap().contains("command text is empty"));
}

#[tokio::test]
async fn branches_are_isolated() {
    let mut g = WorkflowGraph::new();
    let a = g.add_host(host(1, "web-1"), at());
    let b = g.add_host(host(2, "web-2"), at());
    let name = named(&mut g, "hostname", "name");
    let report_ok = command(&mut g, "echo ok {{name.stdout}}");
    let report_bad = command(&mut g, "echo bad");
    for h in [a, b] {
        link(&mut g, h, name, EdgeCondition::Default);
    }
    link(&mut g, name, report_ok, EdgeCondition::OnSuccess);
    link(&mut g, name, report_bad, EdgeCondition::OnFailure);

    let gw = Arc::new(
        MockGateway::new()
            .on_host("web-1", "hostname", Reply::ok("alpha"))
            .on_host("web-2", "hostname", Reply::exit(1, "")),
    );
    let exec = executor(&gw);
    let report = exec.execute(&g).await;

    assert_eq!(gw.commands_for("web-1"), vec!["hostname", "echo ok alpha"]);
    assert_eq!(gw.commands_for("web-2"), vec!["hostname", "echo bad"]);
    assert_eq!(exec.board().node_status(a, name), NodeStatus::Success);
    assert_eq!(exec.board().node_status(b, name), NodeStatus::Failure);
    assert_eq!(report.records.len(), 4);
}

#[tokio::test]
async fn hosts_run_concurrently() {
    let mut g = WorkflowGraph::new();
    let c = command(&mut g, "sleep 1");
    for (id, name) in [(1, "web-1"), (2, "web-2"), (3, "web-3")] {
        let h = g.add_host(host(id, name), at());
        link(&mut g, h, c, EdgeCondition::Default);
    }

    let gw = Arc::new(MockGateway::new().with_delay(Duration::from_millis(50)));
    executor(&gw).execute(&g).await;

    assert_eq!(gw.call_count(), 3);
    assert_eq!(gw.peak_concurrency(), 3);
}

#[tokio::test]
async fn siblings_run_concurrently_and_are_all_awaited() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let a = command(&mut g, "echo a");
    let b = command(&mut g, "echo b");
    let after_b = command(&mut g, "echo after-b");
    link(&mut g, h, a, EdgeCondition::Default);
    link(&mut g, h, b, EdgeCondition::Default);
    link(&mut g, b, after_b, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new().with_delay(Duration::from_millis(30)));
    let report = executor(&gw).execute(&g).await;

    assert_eq!(gw.peak_concurrency(), 2);
    assert_eq!(report.records.len(), 3);
    let calls = gw.commands_for("web-1");
    assert_eq!(calls.last().map(String::as_str), Some("echo after-b"));
}

fn diamond() -> (WorkflowGraph, NodeId) {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let left = command(&mut g, "echo left");
    let right = command(&mut g, "echo right");
    let join = command(&mut g, "echo join");
    link(&mut g, h, left, EdgeCondition::Default);
    link(&mut g, h, right, EdgeCondition::Default);
    link(&mut g, left, join, EdgeCondition::Default);
    link(&mut g, right, join, EdgeCondition::Default);
    (g, join)
}

#[tokio::test]
async fn reconvergent_node_runs_once_by_default() {
    let (g, join) = diamond();
    let gw = Arc::new(MockGateway::new());
    let report = executor(&gw).execute(&g).await;

    assert_eq!(report.records_for(join).count(), 1);
    assert_eq!(gw.call_count(), 3);
}

#[tokio::test]
async fn reconvergent_node_runs_per_path_when_configured() {
    let (g, join) = diamond();
    let gw = Arc::new(MockGateway::new());
    let config = EngineConfig {
        reentry: Reentry::PerPath,
        ..EngineConfig::default()
    };
    let report = executor(&gw).with_config(config).execute(&g).await;

    assert_eq!(report.records_for(join).count(), 2);
    assert_eq!(gw.call_count(), 4);
}

fn cycle() -> (WorkflowGraph, NodeId, NodeId) {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let a = command(&mut g, "echo a");
    let b = command(&mut g, "echo b");
    link(&mut g, h, a, EdgeCondition::Default);
    link(&mut g, a, b, EdgeCondition::Default);
    link(&mut g, b, a, EdgeCondition::Default);
    (g, a, b)
}

#[tokio::test]
async fn cycle_terminates_under_once() {
    let (g, a, b) = cycle();
    let gw = Arc::new(MockGateway::new());
    let report = executor(&gw).execute(&g).await;

    assert_eq!(report.records_for(a).count(), 1);
    assert_eq!(report.records_for(b).count(), 1);
}

#[tokio::test]
async fn cycle_is_capped_under_per_path() {
    let (g, a, b) = cycle();
    let gw = Arc::new(MockGateway::new());
    let config = EngineConfig {
        reentry: Reentry::PerPath,
        max_node_visits: 3,
        ..EngineConfig::default()
    };
    let report = executor(&gw).with_config(config).execute(&g).await;

    assert_eq!(report.records_for(a).count(), 3);
    assert_eq!(report.records_for(b).count(), 3);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.contains("limit of 3 executions")));
}

#[tokio::test]
async fn failing_global_store_leaves_placeholders() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c1 = command(&mut g, "echo {{global.msg}}");
    link(&mut g, h, c1, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let report = executor(&gw)
        .with_globals(Arc::new(FailingGlobalStore))
        .execute(&g)
        .await;

    assert_eq!(gw.commands_for("web-1"), vec!["echo {{global.msg}}"]);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.starts_with("global variables unavailable")));
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn upload_resolves_remote_path_and_exposes_it() {
    let (_dir, path) = hostflow_test_utils::temp_file("app.tar.gz", "payload");
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let up = g.add_upload(
        UploadNode::new(FileHandle::from_path(&path), "/srv/{{global.env}}/").with_ref("bundle"),
        at(),
    );
    let unpack = command(&mut g, "tar xf {{bundle.path}}");
    let out = g.add_output(at());
    link(&mut g, h, up, EdgeCondition::Default);
    link(&mut g, up, unpack, EdgeCondition::OnSuccess);
    link(&mut g, up, out, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let globals: GlobalVariables = [("env", "prod")].into_iter().collect();
    let exec = executor(&gw);
    exec.execute_with_globals(&g, globals).await;

    assert_eq!(
        gw.calls(),
        vec![
            GatewayCall::Upload {
                host: "web-1".into(),
                file: "app.tar.gz".into(),
                remote_path: "/srv/prod/".into(),
            },
            GatewayCall::Command {
                host: "web-1".into(),
                command: "tar xf /srv/prod/".into(),
            },
        ]
    );
    let shown = exec.board().output(out).unwrap();
    assert_eq!(shown.result.path.as_deref(), Some("/srv/prod/"));
}

#[tokio::test]
async fn upload_without_file_fails() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let up = g.add_upload(
        UploadNode {
            file_name: Some("app.tar.gz".into()),
            ..UploadNode::default()
        },
        at(),
    );
    link(&mut g, h, up, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let report = executor(&gw).execute(&g).await;

    assert_eq!(gw.call_count(), 0);
    let record = report.records_for(up).next().unwrap();
    assert!(record
        .error
        .as_deref()
        .unwrap()
        .contains("\"app.tar.gz\" must be re-attached"));
}

#[tokio::test]
async fn edges_into_hosts_are_not_followed() {
    let mut g = WorkflowGraph::new();
    let a = g.add_host(host(1, "web-1"), at());
    let b = g.add_host(host(2, "web-2"), at());
    let c = command(&mut g, "uptime");
    link(&mut g, a, c, EdgeCondition::Default);
    link(&mut g, c, b, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    executor(&gw).execute(&g).await;

    assert_eq!(gw.commands_for("web-1"), vec!["uptime"]);
    assert!(gw.commands_for("web-2").is_empty());
}

#[tokio::test]
async fn run_events_bracket_the_run() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c = command(&mut g, "uptime");
    let out = g.add_output(at());
    link(&mut g, h, c, EdgeCondition::Default);
    link(&mut g, c, out, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let exec = executor(&gw);
    let mut rx = exec.event_bus().subscribe();
    exec.execute(&g).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(RunEvent::RunStarted { hosts: 1, .. })));
    assert!(matches!(
        events.last(),
        Some(RunEvent::RunFinished { succeeded: 1, failed: 0, .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::OutputUpdated { output_id, source, .. } if *output_id == out && *source == c
    )));
}

#[tokio::test]
async fn rerun_resets_previous_state() {
    let mut g = WorkflowGraph::new();
    let h = g.add_host(host(1, "web-1"), at());
    let c = command(&mut g, "uptime");
    link(&mut g, h, c, EdgeCondition::Default);

    let gw = Arc::new(MockGateway::new());
    let exec = executor(&gw);
    let first = exec.execute(&g).await;
    let second = exec.execute(&g).await;

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.records.len(), 1);
    assert_eq!(gw.call_count(), 2);
}
