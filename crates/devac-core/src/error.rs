//! Error taxonomy for the engine.
//!
//! Parsers and effect mappers recover locally; storage and hub errors
//! propagate with their causes preserved. Bulk pipelines report through
//! [`BulkOutcome`] envelopes so partial progress stays visible.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Front-end failure. Non-fatal at the orchestrator: a file that fails to
/// parse is recorded with warnings and excluded from seed output.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error in {file}: {detail}")]
    Syntax { file: String, detail: String },

    #[error("parsing {file} exceeded {timeout_ms}ms")]
    Timeout { file: String, timeout_ms: u64 },

    #[error("external front-end failed for {file}: {detail}")]
    ExternalToolFailure { file: String, detail: String },

    #[error("no front-end registered for {file}")]
    Unsupported { file: String },
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax",
            Self::Timeout { .. } => "timeout",
            Self::ExternalToolFailure { .. } => "external_tool_failure",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    /// The file the failure belongs to.
    pub fn file(&self) -> &str {
        match self {
            Self::Syntax { file, .. }
            | Self::Timeout { file, .. }
            | Self::ExternalToolFailure { file, .. }
            | Self::Unsupported { file } => file,
        }
    }
}

/// Seed storage failure. Fatal for the operation; the seed is left in its
/// pre-operation state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("timed out waiting for seed lock at {path}")]
    LockTimeout { path: PathBuf },

    #[error("corrupt partition {path}: {detail}")]
    CorruptPartition { path: PathBuf, detail: String },

    #[error("atomic rename failed for {path}")]
    AtomicRenameFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema mismatch in {path}: expected v{expected}, found v{found}")]
    SchemaMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("seed i/o error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("relational engine error")]
    Relational(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("columnar codec error for {path}")]
    Columnar {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reference resolution failure. Recoverable: the ref stays unresolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("no entity found for symbol {symbol}")]
    UnresolvedRef { symbol: String },

    #[error("symbol {symbol} is ambiguous across {candidates} entities")]
    AmbiguousSymbol { symbol: String, candidates: usize },
}

/// Federation hub failure. Surfaced to the caller; the hub stays consistent.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("unknown repo {repo_id}")]
    UnknownRepo { repo_id: String },

    #[error("no seed found under {path}")]
    MissingSeed { path: PathBuf },

    #[error("query failed to compile: {detail}")]
    QueryCompileFailure { detail: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("hub database error")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("hub i/o error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration failure. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid configuration: {detail}")]
    Invalid { detail: String },
}

/// Envelope for bulk operations: success flag, optional error text, and the
/// counts that did complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub files_processed: usize,
    #[serde(default)]
    pub files_failed: usize,
    #[serde(default)]
    pub rows_written: usize,
}
