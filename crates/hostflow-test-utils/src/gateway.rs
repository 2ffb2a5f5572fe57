use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use hostflow_core::error::{HostflowError, Result};
use hostflow_core::traits::RemoteGateway;
use hostflow_core::types::{CommandOutput, FileHandle, HostRef, UploadOutput};

/// Scripted gateway response.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The action ran; a command reports its streams and exit status.
    Output {
        output: String,
        error: String,
        exit_status: i32,
    },
    /// The gateway itself failed (unreachable host, timeout, ...).
    Error(String),
}

impl Reply {
    pub fn ok(output: &str) -> Self {
        Reply::Output {
            output: output.to_string(),
            error: String::new(),
            exit_status: 0,
        }
    }

    pub fn exit(exit_status: i32, stderr: &str) -> Self {
        Reply::Output {
            output: String::new(),
            error: stderr.to_string(),
            exit_status,
        }
    }

    pub fn error(message: &str) -> Self {
        Reply::Error(message.to_string())
    }
}

/// One call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Command { host: String, command: String },
    Upload { host: String, file: String, remote_path: String },
}

impl GatewayCall {
    pub fn host(&self) -> &str {
        match self {
            GatewayCall::Command { host, .. } | GatewayCall::Upload { host, .. } => host,
        }
    }
}

/// In-memory gateway with scripted replies.
///
/// Unscripted commands succeed; `echo <text>` outputs `<text>\n` like a shell.
/// Unscripted uploads land at the requested path, or `/tmp/<file>` if empty.
#[derive(Default)]
pub struct MockGateway {
    commands: HashMap<String, Reply>,
    host_commands: HashMap<(String, String), Reply>,
    upload_reply: Option<Reply>,
    delay: Option<Duration>,
    calls: Mutex<Vec<GatewayCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `command` on every host.
    pub fn on(mut self, command: &str, reply: Reply) -> Self {
        self.commands.insert(command.to_string(), reply);
        self
    }

    /// Reply to `command` on one host only; wins over [`MockGateway::on`].
    pub fn on_host(mut self, host: &str, command: &str, reply: Reply) -> Self {
        self.host_commands
            .insert((host.to_string(), command.to_string()), reply);
        self
    }

    pub fn on_upload(mut self, reply: Reply) -> Self {
        self.upload_reply = Some(reply);
        self
    }

    /// Hold every call for `delay` before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands sent to one host, in call order.
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Command { host: h, command } if h == host => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn command_reply(&self, host: &str, command: &str) -> Reply {
        if let Some(reply) = self
            .host_commands
            .get(&(host.to_string(), command.to_string()))
        {
            return reply.clone();
        }
        if let Some(reply) = self.commands.get(command) {
            return reply.clone();
        }
        match command.strip_prefix("echo ") {
            Some(text) => Reply::ok(&format!("{}\n", text)),
            None => Reply::ok(""),
        }
    }
}

impl RemoteGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    fn execute_command<'a>(
        &'a self,
        host: &'a HostRef,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            self.enter(GatewayCall::Command {
                host: host.name.clone(),
                command: command.to_string(),
            })
            .await;
            match self.command_reply(&host.name, command) {
                Reply::Output {
                    output,
                    error,
                    exit_status,
                } => Ok(CommandOutput {
                    output,
                    error,
                    exit_status,
                }),
                Reply::Error(message) => Err(HostflowError::Gateway(message)),
            }
        })
    }

    fn upload_file<'a>(
        &'a self,
        host: &'a HostRef,
        file: &'a FileHandle,
        remote_path: &'a str,
    ) -> BoxFuture<'a, Result<UploadOutput>> {
        Box::pin(async move {
            self.enter(GatewayCall::Upload {
                host: host.name.clone(),
                file: file.name.clone(),
                remote_path: remote_path.to_string(),
            })
            .await;
            match &self.upload_reply {
                Some(Reply::Error(message)) => Err(HostflowError::Gateway(message.clone())),
                _ if remote_path.is_empty() => Ok(UploadOutput {
                    remote_path: format!("/tmp/{}", file.name),
                }),
                _ => Ok(UploadOutput {
                    remote_path: remote_path.to_string(),
                }),
            }
        })
    }
}
