//! Workspace configuration.
//!
//! Load order: `.devac/config.toml` → environment variables → defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level DevAC configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevacConfig {
    pub parser: ParserConfig,
    pub storage: StorageConfig,
    pub hub: HubConfig,
}

/// Parser orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Per-file parse timeout in milliseconds.
    pub timeout_ms: u64,
    /// Upper bound on concurrently running out-of-process front-ends.
    pub subprocess_pool_size: usize,
    /// Glob patterns to include (empty means every supported file).
    pub include: Vec<String>,
    /// Glob patterns to exclude.
    pub exclude: Vec<String>,
    /// Command used to launch the Python front-end.
    pub python_command: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            subprocess_pool_size: 4,
            include: Vec::new(),
            exclude: Vec::new(),
            python_command: "python3".to_string(),
        }
    }
}

/// Seed storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a writer waits for the seed lock before giving up.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 60_000,
        }
    }
}

/// Federation hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub database location, relative to the workspace root.
    pub db_path: PathBuf,
    /// Per-query deadline in milliseconds (0 disables).
    pub query_deadline_ms: u64,
    /// Skip hub-shape validation on open (test isolation).
    pub skip_validation: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".devac/hub.db"),
            query_deadline_ms: 0,
            skip_validation: false,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl DevacConfig {
    /// Load config from `.devac/config.toml` in the workspace root, with env
    /// var overrides. Falls back to defaults if no config file exists.
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let config_path = workspace_root.join(".devac").join("config.toml");

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: config_path.clone(),
                detail: e.to_string(),
            })?
        } else {
            Self::default()
        };

        env_override("DEVAC_PARSE_TIMEOUT_MS", &mut config.parser.timeout_ms);
        env_override(
            "DEVAC_SUBPROCESS_POOL",
            &mut config.parser.subprocess_pool_size,
        );
        env_override("DEVAC_LOCK_TIMEOUT_MS", &mut config.storage.lock_timeout_ms);
        env_override("DEVAC_QUERY_DEADLINE_MS", &mut config.hub.query_deadline_ms);

        if config.parser.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                detail: "parser.timeout_ms must be non-zero".to_string(),
            });
        }
        if config.parser.subprocess_pool_size == 0 {
            return Err(ConfigError::Invalid {
                detail: "parser.subprocess_pool_size must be non-zero".to_string(),
            });
        }

        Ok(config)
    }
}
