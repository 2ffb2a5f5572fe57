use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use hostflow_core::event::{EventBus, RunEvent};

/// JSONL run logger.
///
/// Subscribes to the EventBus and writes one JSON object per line. The file
/// is append-only and flushed after every entry, so a crash mid-run leaves
/// every earlier line intact.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
}

/// A single log entry written to the JSONL file.
#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a RunEvent,
}

impl RunLogger {
    /// Create a new RunLogger.
    ///
    /// Logs are written to `{log_dir}/{timestamp}.jsonl`.
    /// `level` controls verbosity: 1=run and branch, 2=+node results, 3=+node starts.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self { log_dir, level }
    }

    /// Subscribe now, so no event published after this call is missed, and
    /// return the future that writes the log until the run finishes or
    /// `cancel` fires.
    pub fn start(
        self,
        event_bus: &Arc<EventBus>,
        cancel: CancellationToken,
    ) -> impl std::future::Future<Output = Option<PathBuf>> + Send + 'static {
        let rx = event_bus.subscribe();
        self.run(rx, cancel)
    }

    async fn run(self, mut rx: Receiver<RunEvent>, cancel: CancellationToken) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return None;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%.3f").to_string();
        let log_path = self.log_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return None;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");

        let mut writer = tokio::io::BufWriter::new(file);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if self.includes(&event) {
                                let entry = LogEntry {
                                    timestamp: Utc::now().to_rfc3339(),
                                    event: &event,
                                };
                                if let Ok(json) = serde_json::to_string(&entry) {
                                    let line = format!("{}\n", json);
                                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                                        error!(error = %e, "Failed to write log entry");
                                        break;
                                    }
                                    // Flush after each entry for crash resilience
                                    if let Err(e) = writer.flush().await {
                                        error!(error = %e, "Failed to flush log");
                                    }
                                }
                            }

                            if matches!(event, RunEvent::RunFinished { .. }) {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        // Final flush
        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
        Some(log_path)
    }

    /// Whether an event is logged at this logger's level.
    fn includes(&self, event: &RunEvent) -> bool {
        match event {
            RunEvent::RunStarted { .. }
            | RunEvent::RunFinished { .. }
            | RunEvent::BranchStarted { .. }
            | RunEvent::BranchFinished { .. }
            | RunEvent::NoTasks { .. } => true,
            RunEvent::NodeFinished { .. }
            | RunEvent::OutputUpdated { .. }
            | RunEvent::Diagnostic { .. } => self.level >= 2,
            RunEvent::NodeStarted { .. } => self.level >= 3,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
