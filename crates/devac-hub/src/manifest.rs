//! Per-repo `manifest.json`: the packages the hub registered for a repo.

use chrono::{DateTime, Utc};
use devac_core::error::HubError;
use devac_seed::meta::SeedStatistics;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPackage {
    /// Package path relative to the repo root.
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub seed_stats: SeedStatistics,
    /// Signature over the package's file hashes; staleness detection input.
    #[serde(default)]
    pub hash_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub repo_id: String,
    pub packages: Vec<ManifestPackage>,
    pub last_refresh: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
}

impl Manifest {
    pub fn path_for(repo_root: &Path) -> std::path::PathBuf {
        repo_root.join(MANIFEST_FILE)
    }

    pub fn read(repo_root: &Path) -> Result<Option<Self>, HubError> {
        let path = Self::path_for(repo_root);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| HubError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| HubError::QueryCompileFailure {
                detail: format!("invalid manifest at {}: {e}", path.display()),
            })
    }

    pub fn write(&self, repo_root: &Path) -> Result<(), HubError> {
        let path = Self::path_for(repo_root);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            HubError::QueryCompileFailure {
                detail: format!("failed to serialize manifest: {e}"),
            }
        })?;
        std::fs::write(&path, json).map_err(|e| HubError::Io { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_roundtrips_camel_case() {
        let tmp = TempDir::new().unwrap();
        let manifest = Manifest {
            repo_id: "github.com/acme/shop".to_string(),
            packages: vec![ManifestPackage {
                path: "packages/api".to_string(),
                name: "api".to_string(),
                seed_stats: SeedStatistics::default(),
                hash_signature: "sig".to_string(),
            }],
            last_refresh: Utc::now(),
            git_remote: Some("git@github.com:acme/shop.git".to_string()),
        };
        manifest.write(tmp.path()).unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap();
        assert!(raw.contains("\"repoId\""));
        assert!(raw.contains("\"lastRefresh\""));
        assert!(raw.contains("\"seedStats\""));

        let back = Manifest::read(tmp.path()).unwrap().unwrap();
        assert_eq!(back.repo_id, manifest.repo_id);
        assert_eq!(back.packages.len(), 1);
    }

    #[test]
    fn missing_manifest_reads_none() {
        let tmp = TempDir::new().unwrap();
        assert!(Manifest::read(tmp.path()).unwrap().is_none());
    }
}
