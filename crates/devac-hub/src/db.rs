//! Hub database lifecycle: open-or-create, forced re-init, shape checks.

use devac_core::error::HubError;
use devac_seed::scratch::QueryResult;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

pub(crate) fn db_err(e: rusqlite::Error) -> HubError {
    HubError::Database(Box::new(e))
}

const HUB_DDL: &str = "
CREATE TABLE IF NOT EXISTS repos (
    repo_id TEXT NOT NULL PRIMARY KEY,
    path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    last_refresh TEXT
);
CREATE TABLE IF NOT EXISTS packages (
    repo_id TEXT NOT NULL,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    stats_json TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (repo_id, path)
);
CREATE TABLE IF NOT EXISTS unified_diagnostics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT,
    source TEXT NOT NULL,
    severity TEXT NOT NULL,
    category TEXT,
    file TEXT,
    line INTEGER,
    message TEXT NOT NULL,
    github_pr_number INTEGER,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
";

/// Registration status of a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Active,
    Missing,
    Stale,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Missing => "missing",
            Self::Stale => "stale",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "missing" => Self::Missing,
            "stale" => Self::Stale,
            _ => Self::Active,
        }
    }
}

/// Options for opening a hub.
#[derive(Debug, Clone, Default)]
pub struct HubOptions {
    /// Drop and recreate the database.
    pub force: bool,
    /// Bypass hub-shape checks on startup (test isolation).
    pub skip_validation: bool,
    /// Per-query deadline; `None` disables.
    pub query_deadline: Option<Duration>,
}

/// The workspace-level seed index. Single writer; pass as a handle.
pub struct FederationHub {
    db_path: PathBuf,
    pub(crate) conn: Connection,
    pub(crate) cache: Mutex<HashMap<String, QueryResult>>,
    pub(crate) query_deadline: Option<Duration>,
}

impl FederationHub {
    /// Open the hub, creating the database file if absent (idempotent).
    pub fn open(db_path: &Path, options: HubOptions) -> Result<Self, HubError> {
        if options.force && db_path.exists() {
            info!(path = %db_path.display(), "re-initializing hub database");
            std::fs::remove_file(db_path).map_err(|e| HubError::Io {
                path: db_path.to_path_buf(),
                source: e,
            })?;
        }
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| HubError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(HUB_DDL).map_err(db_err)?;

        let hub = Self {
            db_path: db_path.to_path_buf(),
            conn,
            cache: Mutex::new(HashMap::new()),
            query_deadline: options.query_deadline,
        };
        if !options.skip_validation {
            hub.validate_shape()?;
        }
        Ok(hub)
    }

    /// Drop and recreate the hub database.
    pub fn init(db_path: &Path, force: bool) -> Result<Self, HubError> {
        Self::open(
            db_path,
            HubOptions {
                force,
                ..HubOptions::default()
            },
        )
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of memoized query results. Zero right after any refresh.
    pub fn cache_size(&self) -> usize {
        self.cache.lock().expect("hub cache poisoned").len()
    }

    pub(crate) fn invalidate_cache(&self) {
        self.cache.lock().expect("hub cache poisoned").clear();
    }

    /// Verify the hub tables have the expected shape.
    fn validate_shape(&self) -> Result<(), HubError> {
        for (table, required) in [
            ("repos", &["repo_id", "path", "status", "last_refresh"][..]),
            ("packages", &["repo_id", "path", "name", "stats_json"][..]),
            (
                "unified_diagnostics",
                &["severity", "category", "file", "line", "github_pr_number", "resolved"][..],
            ),
        ] {
            let mut stmt = self
                .conn
                .prepare(&format!("PRAGMA table_info({table})"))
                .map_err(db_err)?;
            let columns: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .map_err(db_err)?
                .collect::<Result<_, _>>()
                .map_err(db_err)?;
            for column in required {
                if !columns.iter().any(|c| c == column) {
                    return Err(HubError::QueryCompileFailure {
                        detail: format!("hub table {table} is missing column {column}"),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hub.db");
        let first = FederationHub::open(&path, HubOptions::default()).unwrap();
        drop(first);
        let second = FederationHub::open(&path, HubOptions::default()).unwrap();
        assert_eq!(second.cache_size(), 0);
    }

    #[test]
    fn force_recreates_the_database() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hub.db");
        {
            let hub = FederationHub::open(&path, HubOptions::default()).unwrap();
            hub.conn
                .execute(
                    "INSERT INTO repos (repo_id, path) VALUES ('r', '/x')",
                    [],
                )
                .unwrap();
        }
        let hub = FederationHub::init(&path, true).unwrap();
        let count: i64 = hub
            .conn
            .query_row("SELECT COUNT(*) FROM repos", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn status_parse_roundtrip() {
        for status in [RepoStatus::Active, RepoStatus::Missing, RepoStatus::Stale] {
            assert_eq!(RepoStatus::parse(status.as_str()), status);
        }
    }
}
