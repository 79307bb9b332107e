//! Repo registration: identity probing, package discovery, manifest upkeep,
//! and status refresh.

use crate::db::{FederationHub, RepoStatus, db_err};
use crate::manifest::{Manifest, ManifestPackage};
use chrono::Utc;
use devac_core::error::HubError;
use devac_seed::layout;
use devac_seed::meta::{SeedMeta, SeedStatistics, bytes_checksum};
use devac_seed::partition::read_rows;
use devac_core::schema::Partition;
use rusqlite::params;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One row of the hub's `repos` table.
#[derive(Debug, Clone)]
pub struct RepoSummary {
    pub repo_id: String,
    pub path: PathBuf,
    pub status: RepoStatus,
    pub last_refresh: Option<String>,
}

/// Normalize a git remote URL to `host/org/name`.
///
/// Handles `git@host:org/name(.git)`, `ssh://git@host/org/name(.git)`, and
/// `http(s)://host/org/name(.git)`. Anything else is unrecognized.
pub fn normalize_git_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let stripped = url.strip_suffix(".git").unwrap_or(url);

    if let Some(rest) = stripped.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        return join_host_path(host, path);
    }
    for scheme in ["ssh://", "https://", "http://"] {
        if let Some(rest) = stripped.strip_prefix(scheme) {
            let rest = rest.split_once('@').map_or(rest, |(_, r)| r);
            let (host, path) = rest.split_once('/')?;
            return join_host_path(host, path);
        }
    }
    None
}

fn join_host_path(host: &str, path: &str) -> Option<String> {
    let path = path.trim_matches('/');
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("{host}/{path}"))
}

/// Probe a repo's identity: git origin URL, then package descriptor name,
/// then the local directory name.
pub fn probe_repo_id(path: &Path) -> (String, Option<String>) {
    if let Ok(repo) = git2::Repository::open(path)
        && let Ok(remote) = repo.find_remote("origin")
        && let Some(url) = remote.url()
    {
        if let Some(normalized) = normalize_git_url(url) {
            return (normalized, Some(url.to_string()));
        }
        warn!(url = %url, "unrecognized git remote URL, falling back");
    }
    if let Some(name) = descriptor_name(path) {
        return (format!("package/{name}"), None);
    }
    let dir = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    (format!("local/{dir}"), None)
}

/// Package name from a `package.json` or `Cargo.toml` in `dir`.
fn descriptor_name(dir: &Path) -> Option<String> {
    let package_json = dir.join("package.json");
    if package_json.exists()
        && let Ok(content) = std::fs::read_to_string(&package_json)
        && let Ok(parsed) = serde_json::from_str::<Value>(&content)
        && let Some(name) = parsed.get("name").and_then(Value::as_str)
    {
        return Some(name.to_string());
    }
    let cargo_toml = dir.join("Cargo.toml");
    if cargo_toml.exists()
        && let Ok(content) = std::fs::read_to_string(&cargo_toml)
        && let Ok(parsed) = content.parse::<toml::Table>()
        && let Some(name) = parsed
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
    {
        return Some(name.to_string());
    }
    None
}

/// Find package descriptor directories under a repo root.
pub fn discover_packages(root: &Path) -> Vec<(String, String)> {
    let mut packages = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = path.file_name().and_then(|n| n.to_str());
        if !matches!(file_name, Some("package.json" | "Cargo.toml")) {
            continue;
        }
        let dir = path.parent().unwrap_or(root);
        let rel = dir
            .strip_prefix(root)
            .unwrap_or(Path::new(""))
            .to_string_lossy()
            .replace('\\', "/");
        if packages.iter().any(|(p, _)| *p == rel) {
            continue;
        }
        let name = descriptor_name(dir).unwrap_or_else(|| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string()
        });
        packages.push((rel, name));
    }
    packages.sort();
    packages
}

/// Stats plus a signature over the package's file hashes. The signature is
/// what staleness detection compares.
pub fn package_seed_stats(package_dir: &Path) -> (SeedStatistics, String) {
    let seed_root = layout::seed_root(package_dir);
    let meta_path = layout::meta_path(&seed_root, layout::BASE_BRANCH);
    let stats = SeedMeta::read(&meta_path)
        .ok()
        .flatten()
        .map(|m| m.statistics)
        .unwrap_or_default();
    (stats, hash_signature(&seed_root))
}

fn hash_signature(seed_root: &Path) -> String {
    let path = layout::partition_path(seed_root, layout::BASE_BRANCH, Partition::FileHashes);
    let Ok(rows) = read_rows(&path, Partition::FileHashes) else {
        return String::new();
    };
    if rows.is_empty() {
        return String::new();
    }
    let mut entries: Vec<String> = rows
        .iter()
        .map(|row| {
            format!(
                "{}:{}",
                row.get("file_path").and_then(Value::as_str).unwrap_or(""),
                row.get("source_file_hash")
                    .and_then(Value::as_str)
                    .unwrap_or("")
            )
        })
        .collect();
    entries.sort();
    bytes_checksum(entries.join("\n").as_bytes())
}

impl FederationHub {
    /// Register (or re-register) a repository. Discovers packages and seed
    /// stats, writes the repo's `manifest.json`, and upserts hub rows.
    /// Registering the same repo id twice updates in place.
    pub fn register_repo(&mut self, path: &Path) -> Result<Manifest, HubError> {
        let root = path.canonicalize().map_err(|e| HubError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (repo_id, git_remote) = probe_repo_id(&root);

        let mut packages = Vec::new();
        for (rel, name) in discover_packages(&root) {
            let dir = if rel.is_empty() { root.clone() } else { root.join(&rel) };
            let (seed_stats, hash_signature) = package_seed_stats(&dir);
            packages.push(ManifestPackage {
                path: rel,
                name,
                seed_stats,
                hash_signature,
            });
        }
        info!(repo_id = %repo_id, packages = packages.len(), "registering repo");

        let manifest = Manifest {
            repo_id: repo_id.clone(),
            packages,
            last_refresh: Utc::now(),
            git_remote,
        };
        manifest.write(&root)?;

        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO repos (repo_id, path, status, last_refresh)
             VALUES (?1, ?2, 'active', ?3)
             ON CONFLICT(repo_id) DO UPDATE SET
                 path = excluded.path,
                 status = 'active',
                 last_refresh = excluded.last_refresh",
            params![
                repo_id,
                root.to_string_lossy(),
                manifest.last_refresh.to_rfc3339()
            ],
        )
        .map_err(db_err)?;
        tx.execute("DELETE FROM packages WHERE repo_id = ?1", params![repo_id])
            .map_err(db_err)?;
        for package in &manifest.packages {
            let stats_json = serde_json::json!({
                "seedStats": package.seed_stats,
                "hashSignature": package.hash_signature,
            });
            tx.execute(
                "INSERT INTO packages (repo_id, path, name, stats_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![repo_id, package.path, package.name, stats_json.to_string()],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;

        self.invalidate_cache();
        Ok(manifest)
    }

    /// Remove a repo from the hub. The repo's own files are untouched.
    pub fn unregister_repo(&mut self, repo_id: &str) -> Result<(), HubError> {
        let changed = self
            .conn
            .execute("DELETE FROM repos WHERE repo_id = ?1", params![repo_id])
            .map_err(db_err)?;
        if changed == 0 {
            return Err(HubError::UnknownRepo {
                repo_id: repo_id.to_string(),
            });
        }
        self.conn
            .execute("DELETE FROM packages WHERE repo_id = ?1", params![repo_id])
            .map_err(db_err)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Re-read a repo's packages and seed stats from disk.
    pub fn refresh_repo(&mut self, repo_id: &str) -> Result<RepoStatus, HubError> {
        let path: String = self
            .conn
            .query_row(
                "SELECT path FROM repos WHERE repo_id = ?1",
                params![repo_id],
                |row| row.get(0),
            )
            .map_err(|_| HubError::UnknownRepo {
                repo_id: repo_id.to_string(),
            })?;

        let root = PathBuf::from(&path);
        if !root.exists() {
            self.set_status(repo_id, RepoStatus::Missing)?;
            self.invalidate_cache();
            return Ok(RepoStatus::Missing);
        }
        self.register_repo(&root)?;
        Ok(RepoStatus::Active)
    }

    /// Refresh every registered repo.
    pub fn refresh_all(&mut self) -> Result<(), HubError> {
        for repo in self.list_repos()? {
            self.refresh_repo(&repo.repo_id)?;
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Walk registered repos and refresh statuses: `missing` when the path is
    /// gone, `stale` when a package's file-hash signature no longer matches
    /// what the hub recorded, `active` otherwise.
    pub fn sync(&mut self) -> Result<Vec<RepoSummary>, HubError> {
        let repos = self.list_repos()?;
        for repo in &repos {
            let status = if repo.path.exists() {
                if self.any_package_stale(&repo.repo_id, &repo.path)? {
                    RepoStatus::Stale
                } else {
                    RepoStatus::Active
                }
            } else {
                RepoStatus::Missing
            };
            if status != repo.status {
                debug!(repo_id = %repo.repo_id, from = repo.status.as_str(),
                       to = status.as_str(), "repo status changed");
            }
            self.set_status(&repo.repo_id, status)?;
        }
        self.invalidate_cache();
        self.list_repos()
    }

    fn any_package_stale(&self, repo_id: &str, root: &Path) -> Result<bool, HubError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, stats_json FROM packages WHERE repo_id = ?1")
            .map_err(db_err)?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params![repo_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;

        for (rel, stats_json) in rows {
            let recorded = serde_json::from_str::<Value>(&stats_json)
                .ok()
                .and_then(|v| {
                    v.get("hashSignature")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            let dir = if rel.is_empty() { root.to_path_buf() } else { root.join(&rel) };
            let current = hash_signature(&layout::seed_root(&dir));
            if recorded != current {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn set_status(&self, repo_id: &str, status: RepoStatus) -> Result<(), HubError> {
        self.conn
            .execute(
                "UPDATE repos SET status = ?1 WHERE repo_id = ?2",
                params![status.as_str(), repo_id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// All registered repos.
    pub fn list_repos(&self) -> Result<Vec<RepoSummary>, HubError> {
        let mut stmt = self
            .conn
            .prepare("SELECT repo_id, path, status, last_refresh FROM repos ORDER BY repo_id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RepoSummary {
                    repo_id: row.get(0)?,
                    path: PathBuf::from(row.get::<_, String>(1)?),
                    status: RepoStatus::parse(&row.get::<_, String>(2)?),
                    last_refresh: row.get(3)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// (repo_id, absolute package dir) for every active package with a seed.
    pub(crate) fn active_packages(&self) -> Result<Vec<(String, PathBuf)>, HubError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT r.repo_id, r.path, p.path
                 FROM repos r JOIN packages p ON p.repo_id = r.repo_id
                 WHERE r.status = 'active'
                 ORDER BY r.repo_id, p.path",
            )
            .map_err(db_err)?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;

        let mut packages = Vec::new();
        for (repo_id, root, rel) in rows {
            let dir = if rel.is_empty() {
                PathBuf::from(&root)
            } else {
                Path::new(&root).join(&rel)
            };
            if layout::seed_exists(&dir) {
                packages.push((repo_id, dir));
            }
        }
        Ok(packages)
    }
}
