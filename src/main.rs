mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostflow_core::config::AppConfig;
use hostflow_core::event::EventBus;
use hostflow_core::traits::{GlobalStore, WorkflowStore};
use hostflow_core::types::{FileHandle, NodeId};
use hostflow_engine::{GlobalVariables, RunLogger, WorkflowExecutor, WorkflowGraph, WorkflowRecord};
use hostflow_remote::HttpGlobalStore;
use hostflow_store::SqliteStore;

#[derive(Parser)]
#[command(name = "hostflow", version, about = "Run command and upload workflows across many hosts")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "hostflow.toml", env = "HOSTFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow
    Run {
        /// Workflow record file (JSON)
        #[arg(required_unless_present = "id")]
        file: Option<PathBuf>,
        /// Run a stored workflow instead of a file
        #[arg(long, conflicts_with = "file")]
        id: Option<i64>,
        /// Bind a local file to an upload node (NODE=PATH, repeatable)
        #[arg(short, long, value_name = "NODE=PATH")]
        attach: Vec<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a workflow record without running it
    Validate {
        /// Workflow record file (JSON)
        file: PathBuf,
    },
    /// Manage global variables
    Globals {
        #[command(subcommand)]
        action: GlobalsAction,
    },
    /// Manage stored workflows
    Workflows {
        #[command(subcommand)]
        action: WorkflowsAction,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum GlobalsAction {
    /// List all global variables
    List,
    /// Create or replace a global variable
    Set {
        key: String,
        value: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a global variable
    Delete { key: String },
}

#[derive(Subcommand)]
enum WorkflowsAction {
    /// List stored workflows
    List,
    /// Store a workflow record file, replacing a stored workflow of the same name
    Save {
        file: PathBuf,
        /// Name to store under (default: file stem)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print a stored workflow record
    Show { id: i64 },
    /// Delete a stored workflow
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hostflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "hostflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            file,
            id,
            attach,
            json,
        } => {
            let record = match (file, id) {
                (Some(path), _) => read_record(&path)?,
                (None, Some(id)) => {
                    let store = open_store(&config)?;
                    let stored = store
                        .get(id)
                        .await?
                        .with_context(|| format!("workflow {} not found", id))?;
                    info!(id, name = %stored.name, "Loaded stored workflow");
                    WorkflowRecord::from_json(stored.data)?
                }
                (None, None) => bail!("either a workflow file or --id is required"),
            };
            let mut graph = record.into_graph_lenient()?;
            for spec in &attach {
                attach_file(&mut graph, spec)?;
            }
            run_workflow(&config, &graph, json).await?;
        }
        Commands::Validate { file } => {
            let graph = read_record(&file)?
                .into_graph()
                .with_context(|| format!("{} is not a valid workflow", file.display()))?;
            let globals = match global_store(&config)?.list().await {
                Ok(vars) => Some(GlobalVariables::from(vars)),
                Err(e) => {
                    warn!(error = %e, "Global variables unavailable, skipping their checks");
                    None
                }
            };
            let findings = hostflow_engine::validate(&graph, globals.as_ref());
            if findings.is_empty() {
                println!("{}: ok ({} nodes, {} edges)", file.display(), graph.len(), graph.edges().len());
            } else {
                print!("{}", render::render_findings(&findings));
                println!("{} finding(s)", findings.len());
            }
        }
        Commands::Globals { action } => {
            let store = global_store(&config)?;
            match action {
                GlobalsAction::List => {
                    let vars = store.list().await?;
                    if vars.is_empty() {
                        println!("No global variables.");
                    }
                    for var in vars {
                        if var.description.is_empty() {
                            println!("{} = {}", var.key, var.value);
                        } else {
                            println!("{} = {}    # {}", var.key, var.value, var.description);
                        }
                    }
                }
                GlobalsAction::Set {
                    key,
                    value,
                    description,
                } => {
                    store.put(&key, &value, &description).await?;
                    println!("Saved {}", key);
                }
                GlobalsAction::Delete { key } => {
                    store.delete(&key).await?;
                    println!("Deleted {}", key);
                }
            }
        }
        Commands::Workflows { action } => {
            let store = open_store(&config)?;
            handle_workflows(&store, action).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(home_config) = dirs_home().map(|h| h.join(".hostflow").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }
    info!("No config file found, using defaults");
    Ok(AppConfig::default())
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let path = config.store_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn global_store(config: &AppConfig) -> anyhow::Result<Arc<dyn GlobalStore>> {
    if config.gateway.remote_globals {
        Ok(Arc::new(HttpGlobalStore::from_config(&config.gateway)?))
    } else {
        let store: Arc<dyn GlobalStore> = open_store(config)?;
        Ok(store)
    }
}

fn read_record(path: &Path) -> anyhow::Result<WorkflowRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(WorkflowRecord::parse(&text)?)
}

/// Apply one `NODE=PATH` binding.
fn attach_file(graph: &mut WorkflowGraph, spec: &str) -> anyhow::Result<()> {
    let (node, path) = spec
        .split_once('=')
        .with_context(|| format!("expected NODE=PATH, got \"{}\"", spec))?;
    let node: u64 = node
        .trim()
        .parse()
        .with_context(|| format!("invalid node id \"{}\"", node))?;
    let path = PathBuf::from(path);
    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }
    graph.attach_file(NodeId(node), FileHandle::from_path(path))?;
    Ok(())
}

async fn run_workflow(config: &AppConfig, graph: &WorkflowGraph, json: bool) -> anyhow::Result<()> {
    let gateway = hostflow_remote::gateway_from_config(&config.gateway)?;
    let event_bus = Arc::new(EventBus::new(config.engine.event_capacity));
    let executor = WorkflowExecutor::new(gateway)
        .with_config(config.engine.clone())
        .with_event_bus(event_bus.clone())
        .with_globals(global_store(config)?);

    let cancel = CancellationToken::new();
    let logger = config.log_dir().map(|dir| {
        tokio::spawn(RunLogger::new(dir, config.log_level()).start(&event_bus, cancel.clone()))
    });

    let rx = event_bus.subscribe();
    let printer = tokio::spawn(render::follow_progress(rx, |line| eprintln!("{}", line)));

    let report = tokio::select! {
        report = executor.execute(graph) => report,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            bail!("interrupted");
        }
    };

    printer.await.ok();
    if let Some(handle) = logger {
        if let Ok(Some(path)) = handle.await {
            info!(path = %path.display(), "Run log written");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&report, executor.board(), graph));
    }

    if report.failed() > 0 {
        bail!("{} node(s) failed", report.failed());
    }
    Ok(())
}

async fn handle_workflows(store: &SqliteStore, action: WorkflowsAction) -> anyhow::Result<()> {
    match action {
        WorkflowsAction::List => {
            let workflows = WorkflowStore::list(store).await?;
            if workflows.is_empty() {
                println!("No stored workflows.");
            }
            for wf in workflows {
                println!(
                    "{:>4}  {:<24} {}  {}",
                    wf.id,
                    wf.name,
                    wf.updated_at.format("%Y-%m-%d %H:%M"),
                    wf.description
                );
            }
        }
        WorkflowsAction::Save {
            file,
            name,
            description,
        } => {
            let record = read_record(&file)?;
            // Reject records that would not load back.
            record.clone().into_graph()?;
            let data = record.to_json()?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .context("cannot derive a name from the file, pass --name")?,
            };
            match store.find_workflow(&name)? {
                Some(id) => {
                    store.update(id, Some(&data), description.as_deref()).await?;
                    println!("Updated workflow {} ({})", id, name);
                }
                None => {
                    let id = store
                        .create(&name, description.as_deref().unwrap_or(""), &data)
                        .await?;
                    println!("Created workflow {} ({})", id, name);
                }
            }
        }
        WorkflowsAction::Show { id } => {
            let wf = store
                .get(id)
                .await?
                .with_context(|| format!("workflow {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(&wf.data)?);
        }
        WorkflowsAction::Delete { id } => {
            WorkflowStore::delete(store, id).await?;
            println!("Deleted workflow {}", id);
        }
    }
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
