//! Declarative effect-mapping catalogs and their two-layer merge.
//!
//! A catalog is a JSON document with four pattern lists plus groups. At most
//! two layers apply: workspace-wide and package-local. Package entries
//! override workspace entries carrying the same `pattern` key; otherwise
//! both layers contribute.

use devac_core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingMetadata {
    pub package_name: String,
    pub verified: bool,
}

/// Promotes a matching FunctionCall to a Store effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreMapping {
    pub pattern: String,
    pub store_type: String,
    pub operation: String,
    pub target_resource: Option<String>,
    pub provider: Option<String>,
    /// Equality match instead of substring.
    pub exact: bool,
}

impl Default for StoreMapping {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            store_type: "external".to_string(),
            operation: String::new(),
            target_resource: None,
            provider: None,
            exact: false,
        }
    }
}

/// Promotes a matching FunctionCall to a Retrieve effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveMapping {
    pub pattern: String,
    pub retrieve_type: String,
    pub operation: String,
    pub source_resource: Option<String>,
    pub provider: Option<String>,
    pub exact: bool,
}

impl Default for RetrieveMapping {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            retrieve_type: "external".to_string(),
            operation: String::new(),
            source_resource: None,
            provider: None,
            exact: false,
        }
    }
}

/// Promotes a matching FunctionCall to a Send effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCallMapping {
    pub pattern: String,
    pub send_type: String,
    pub target: Option<String>,
    pub is_third_party: bool,
    pub service_name: Option<String>,
    pub exact: bool,
}

impl Default for ExternalCallMapping {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            send_type: "http".to_string(),
            target: None,
            is_third_party: false,
            service_name: None,
            exact: false,
        }
    }
}

/// Promotes a matching FunctionCall to a Request effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestHandlerMapping {
    pub pattern: String,
    pub method: String,
    pub route_pattern: Option<String>,
    pub framework: Option<String>,
    pub exact: bool,
}

/// Names a set of callee patterns; matching effects are tagged with the
/// group name in their properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMapping {
    pub name: String,
    pub patterns: Vec<String>,
}

/// One catalog layer (workspace or package).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageEffectMappings {
    pub metadata: MappingMetadata,
    pub store_operations: Vec<StoreMapping>,
    pub retrieve_operations: Vec<RetrieveMapping>,
    pub external_calls: Vec<ExternalCallMapping>,
    pub request_handlers: Vec<RequestHandlerMapping>,
    pub groups: Vec<GroupMapping>,
}

impl PackageEffectMappings {
    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Load a catalog if the file exists; `None` otherwise.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Merge a package layer over a workspace layer.
    ///
    /// Package entries win on equal `pattern` keys; everything else is the
    /// union of both layers, workspace entries first.
    pub fn merged(workspace: &Self, package: &Self) -> Self {
        Self {
            metadata: package.metadata.clone(),
            store_operations: merge_by_pattern(
                &workspace.store_operations,
                &package.store_operations,
                |m| &m.pattern,
            ),
            retrieve_operations: merge_by_pattern(
                &workspace.retrieve_operations,
                &package.retrieve_operations,
                |m| &m.pattern,
            ),
            external_calls: merge_by_pattern(
                &workspace.external_calls,
                &package.external_calls,
                |m| &m.pattern,
            ),
            request_handlers: merge_by_pattern(
                &workspace.request_handlers,
                &package.request_handlers,
                |m| &m.pattern,
            ),
            groups: merge_by_pattern(&workspace.groups, &package.groups, |g| &g.name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.store_operations.is_empty()
            && self.retrieve_operations.is_empty()
            && self.external_calls.is_empty()
            && self.request_handlers.is_empty()
            && self.groups.is_empty()
    }
}

fn merge_by_pattern<T: Clone>(
    workspace: &[T],
    package: &[T],
    key: impl Fn(&T) -> &String,
) -> Vec<T> {
    let mut merged: Vec<T> = workspace
        .iter()
        .filter(|w| !package.iter().any(|p| key(p) == key(w)))
        .cloned()
        .collect();
    merged.extend(package.iter().cloned());
    merged
}
