use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use hostflow_core::error::{HostflowError, Result};
use hostflow_core::traits::RemoteGateway;
use hostflow_core::types::{CommandOutput, FileHandle, HostRef, UploadOutput};

use crate::path::normalize_remote_path;

/// Runs every action on this machine, whatever host it targets.
///
/// Commands go through `sh -c`; uploads are file copies.
pub struct LocalGateway {
    shell: String,
    timeout_secs: u64,
}

impl LocalGateway {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            shell: "sh".to_string(),
            timeout_secs,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl RemoteGateway for LocalGateway {
    fn name(&self) -> &str {
        "local"
    }

    fn execute_command<'a>(
        &'a self,
        host: &'a HostRef,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            debug!(host = %host.name, command = %command, "Executing local command");

            let timeout = Duration::from_secs(self.timeout_secs);
            let result = tokio::time::timeout(
                timeout,
                tokio::process::Command::new(&self.shell)
                    .arg("-c")
                    .arg(command)
                    .kill_on_drop(true)
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) => Ok(CommandOutput {
                    output: String::from_utf8_lossy(&output.stdout).into_owned(),
                    error: String::from_utf8_lossy(&output.stderr).into_owned(),
                    // Killed by a signal
                    exit_status: output.status.code().unwrap_or(-1),
                }),
                Ok(Err(e)) => Err(HostflowError::Gateway(format!(
                    "failed to start {}: {}",
                    self.shell, e
                ))),
                Err(_) => Err(HostflowError::GatewayTimeout {
                    action: "execute".to_string(),
                    timeout_secs: self.timeout_secs,
                }),
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
            let remote_path = normalize_remote_path(remote_path, &file.name);
            debug!(host = %host.name, file = %file.name, remote_path = %remote_path, "Copying file");

            if let Some(parent) = Path::new(&remote_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&file.path, &remote_path)
                .await
                .map_err(|e| {
                    HostflowError::Gateway(format!(
                        "copy {} to {}: {}",
                        file.path.display(),
                        remote_path,
                        e
                    ))
                })?;

            Ok(UploadOutput { remote_path })
        })
    }
}
