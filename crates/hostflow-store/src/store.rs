use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use hostflow_core::error::{HostflowError, Result};
use hostflow_core::traits::{GlobalStore, WorkflowStore};
use hostflow_core::types::{GlobalVariable, StoredWorkflow, WorkflowSummary};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS global_variables (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workflows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_workflows_updated ON workflows(updated_at);";

/// SQLite-backed store for global variables and named workflows.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> HostflowError {
    HostflowError::Database(e.to_string())
}

/// Fixed-width timestamps so text order matches time order.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HostflowError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HostflowError::Database(e.to_string()))
    }

    /// Find a workflow id by its unique name.
    pub fn find_workflow(&self, name: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id FROM workflows WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }
}

impl GlobalStore for SqliteStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<GlobalVariable>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare("SELECT key, value, description FROM global_variables ORDER BY key")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GlobalVariable {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        description: row.get(2)?,
                    })
                })
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if key.trim().is_empty() {
                return Err(HostflowError::InvalidInput(
                    "global variable key must not be empty".into(),
                ));
            }
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO global_variables (key, value, description, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    description = excluded.description,
                    updated_at = excluded.updated_at",
                params![key, value, description, now()],
            )
            .map_err(db_err)?;
            debug!(key, "Global variable saved");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let conn = self.lock()?;
            conn.execute("DELETE FROM global_variables WHERE key = ?1", params![key])
                .map_err(db_err)?;
            Ok(())
        })
    }
}

impl WorkflowStore for SqliteStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<WorkflowSummary>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, description, updated_at FROM workflows
                     ORDER BY updated_at DESC, id DESC",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    let updated: String = row.get(3)?;
                    Ok(WorkflowSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        updated_at: parse_time(&updated),
                    })
                })
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
        })
    }

    fn create<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
        data: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<i64>> {
        Box::pin(async move {
            if name.trim().is_empty() {
                return Err(HostflowError::InvalidInput(
                    "workflow name must not be empty".into(),
                ));
            }
            let body = serde_json::to_string(data)?;
            let stamp = now();
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO workflows (name, description, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![name, description, body, stamp],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref f, _)
                    if f.code == ErrorCode::ConstraintViolation =>
                {
                    HostflowError::Conflict(format!("workflow \"{}\" already exists", name))
                }
                other => db_err(other),
            })?;
            let id = conn.last_insert_rowid();
            debug!(id, name, "Workflow created");
            Ok(id)
        })
    }

    fn get(&self, id: i64) -> BoxFuture<'_, Result<Option<StoredWorkflow>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let row = conn
                .query_row(
                    "SELECT id, name, description, data, created_at, updated_at
                     FROM workflows WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                )
                .optional()
                .map_err(db_err)?;

            let Some((id, name, description, data, created, updated)) = row else {
                return Ok(None);
            };
            Ok(Some(StoredWorkflow {
                id,
                name,
                description,
                data: serde_json::from_str(&data)?,
                created_at: parse_time(&created),
                updated_at: parse_time(&updated),
            }))
        })
    }

    fn update<'a>(
        &'a self,
        id: i64,
        data: Option<&'a serde_json::Value>,
        description: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = data.map(serde_json::to_string).transpose()?;
            let conn = self.lock()?;
            let changed = conn
                .execute(
                    "UPDATE workflows SET
                        data = COALESCE(?1, data),
                        description = COALESCE(?2, description),
                        updated_at = ?3
                     WHERE id = ?4",
                    params![body, description, now(), id],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(HostflowError::NotFound(format!("workflow {}", id)));
            }
            Ok(())
        })
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let changed = conn
                .execute("DELETE FROM workflows WHERE id = ?1", params![id])
                .map_err(db_err)?;
            if changed == 0 {
                return Err(HostflowError::NotFound(format!("workflow {}", id)));
            }
            Ok(())
        })
    }
}
