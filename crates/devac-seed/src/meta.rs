//! `meta.json`: schema version, statistics, and per-partition checksums.
//!
//! The checksum map is what lets a writer detect a crash that happened
//! between partition renames; absent fields read as schema v1.

use chrono::{DateTime, Utc};
use devac_core::error::StorageError;
use devac_core::schema::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Row counts of the live (non-deleted) rows of one branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedStatistics {
    pub node_count: u64,
    pub edge_count: u64,
    pub ref_count: u64,
    pub effect_count: u64,
    pub file_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedMeta {
    pub schema_version: u32,
    pub branch: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub statistics: SeedStatistics,
    /// partition file name → SHA-256 of the committed file bytes.
    pub partition_checksums: BTreeMap<String, String>,
}

impl Default for SeedMeta {
    fn default() -> Self {
        Self {
            // A meta.json with no schemaVersion field is treated as v1.
            schema_version: 1,
            branch: String::new(),
            generated_at: None,
            statistics: SeedStatistics::default(),
            partition_checksums: BTreeMap::new(),
        }
    }
}

impl SeedMeta {
    pub fn new(branch: &str, statistics: SeedStatistics) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            branch: branch.to_string(),
            generated_at: Some(Utc::now()),
            statistics,
            partition_checksums: BTreeMap::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Option<Self>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        let meta = serde_json::from_str(&content).map_err(|e| StorageError::CorruptPartition {
            path: path.to_path_buf(),
            detail: format!("invalid meta.json: {e}"),
        })?;
        Ok(Some(meta))
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::CorruptPartition {
            path: "meta.json".into(),
            detail: e.to_string(),
        })
    }
}

/// SHA-256 of a file's bytes, hex-encoded. Missing files hash as empty input.
pub fn file_checksum(path: &Path) -> Result<String, StorageError> {
    let mut hasher = Sha256::new();
    match std::fs::read(path) {
        Ok(bytes) => hasher.update(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::io(path, e)),
    }
    Ok(hex(&hasher.finalize()))
}

/// SHA-256 of a byte slice, hex-encoded.
pub fn bytes_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_schema_version_reads_as_v1() {
        let meta: SeedMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.schema_version, 1);
        assert_eq!(meta.statistics.node_count, 0);
    }

    #[test]
    fn meta_serializes_camel_case() {
        let meta = SeedMeta::new("base", SeedStatistics::default());
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"schemaVersion\""));
        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"nodeCount\""));
    }

    #[test]
    fn checksum_is_stable() {
        assert_eq!(bytes_checksum(b"abc"), bytes_checksum(b"abc"));
        assert_ne!(bytes_checksum(b"abc"), bytes_checksum(b"abd"));
    }
}
