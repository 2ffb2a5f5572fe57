use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HostflowError, Result};

/// Top-level Hostflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

/// Which gateway performs remote actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    /// The host-management service's REST API.
    #[default]
    Http,
    /// Run everything on this machine (useful for dry runs and demos).
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub kind: GatewayKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. A timed out action becomes a failed node.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Read global variables from the service instead of the local store.
    #[serde(default)]
    pub remote_globals: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: GatewayKind::default(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            remote_globals: false,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// How a node reached by several paths within one branch is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reentry {
    /// Execute once per branch; the first path to arrive wins.
    #[default]
    Once,
    /// Execute once per incoming path, bounded by `max_node_visits`.
    PerPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reentry: Reentry,
    /// Cap on executions of one node within one branch under `per_path`.
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reentry: Reentry::default(),
            max_node_visits: default_max_node_visits(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_max_node_visits() -> usize {
    5
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "~/.hostflow/hostflow.db".to_string()
}

/// Runtime logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// 1 = run and branch events, 2 = + node results, 3 = + node starts.
    #[serde(default = "default_log_level")]
    pub level: u8,
}

fn default_log_level() -> u8 {
    2
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> String {
    "~/.hostflow/logs".to_string()
}

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| HostflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| HostflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.engine.event_capacity == 0 {
            return Err(HostflowError::Config(
                "engine.event_capacity must be at least 1".into(),
            ));
        }
        if self.engine.max_node_visits == 0 {
            return Err(HostflowError::Config(
                "engine.max_node_visits must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the database path (expand ~).
    pub fn store_path(&self) -> PathBuf {
        expand_home(&self.store.path)
    }

    /// Resolve the run log directory, if run logging is enabled.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log
            .as_ref()
            .filter(|l| l.enabled)
            .map(|l| expand_home(&l.dir))
    }

    pub fn log_level(&self) -> u8 {
        self.log.as_ref().map_or_else(default_log_level, |l| l.level)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
