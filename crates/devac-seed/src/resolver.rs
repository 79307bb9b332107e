//! Package-local resolver pass.
//!
//! Matches `unresolved:<symbol>` edge targets and unresolved import refs
//! against the package's own nodes and rewrites them through the writer's
//! resolved-update operations. Resolution failures are recoverable: the
//! sentinel stays in place and the ref stays unresolved.

use crate::layout::{self, BASE_BRANCH};
use crate::partition::read_rows;
use crate::writer::{ResolvedEdgeUpdate, ResolvedRefUpdate, SeedWriter};
use devac_core::entity_id::unresolved_symbol;
use devac_core::error::{ResolutionError, StorageError};
use devac_core::schema::Partition;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// What one resolver pass accomplished.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub resolved_call_edges: usize,
    pub resolved_extends_edges: usize,
    pub resolved_refs: usize,
    /// Symbols left unresolved, with the reason.
    pub failures: Vec<ResolutionError>,
}

impl ResolutionOutcome {
    pub fn total_resolved(&self) -> usize {
        self.resolved_call_edges + self.resolved_extends_edges + self.resolved_refs
    }
}

/// Candidate index over a package's live nodes.
struct SymbolIndex {
    by_name: HashMap<String, Vec<String>>,
    by_qualified: HashMap<String, Vec<String>>,
    exported_by_name: HashMap<String, Vec<String>>,
}

impl SymbolIndex {
    fn build(nodes: &[Value]) -> Self {
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_qualified: HashMap<String, Vec<String>> = HashMap::new();
        let mut exported_by_name: HashMap<String, Vec<String>> = HashMap::new();
        for node in nodes {
            if node
                .get("is_deleted")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                continue;
            }
            let Some(entity_id) = node.get("entity_id").and_then(Value::as_str) else {
                continue;
            };
            if let Some(name) = node.get("name").and_then(Value::as_str) {
                by_name
                    .entry(name.to_string())
                    .or_default()
                    .push(entity_id.to_string());
                if node
                    .get("is_exported")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    exported_by_name
                        .entry(name.to_string())
                        .or_default()
                        .push(entity_id.to_string());
                }
            }
            if let Some(qualified) = node.get("qualified_name").and_then(Value::as_str) {
                by_qualified
                    .entry(qualified.to_string())
                    .or_default()
                    .push(entity_id.to_string());
            }
        }
        Self {
            by_name,
            by_qualified,
            exported_by_name,
        }
    }

    /// Unique candidate for a symbol: qualified name wins over bare name.
    fn lookup(&self, symbol: &str) -> Result<String, ResolutionError> {
        let candidates = self
            .by_qualified
            .get(symbol)
            .filter(|c| !c.is_empty())
            .or_else(|| self.by_name.get(symbol))
            .map(Vec::as_slice)
            .unwrap_or_default();
        single(symbol, candidates)
    }

    /// Unique exported candidate, for import refs.
    fn lookup_exported(&self, symbol: &str) -> Result<String, ResolutionError> {
        let candidates = self
            .exported_by_name
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or_default();
        single(symbol, candidates)
    }
}

fn single(symbol: &str, candidates: &[String]) -> Result<String, ResolutionError> {
    match candidates {
        [] => Err(ResolutionError::UnresolvedRef {
            symbol: symbol.to_string(),
        }),
        [only] => Ok(only.clone()),
        many => Err(ResolutionError::AmbiguousSymbol {
            symbol: symbol.to_string(),
            candidates: many.len(),
        }),
    }
}

/// Run one resolver pass over a package's branch.
pub fn resolve_package(
    package_root: &Path,
    branch: &str,
) -> Result<ResolutionOutcome, StorageError> {
    let seed_root = layout::seed_root(package_root);
    let nodes = read_rows(
        &layout::partition_path(&seed_root, branch, Partition::Nodes),
        Partition::Nodes,
    )?;
    let edges = read_rows(
        &layout::partition_path(&seed_root, branch, Partition::Edges),
        Partition::Edges,
    )?;
    let refs = read_rows(
        &layout::partition_path(&seed_root, branch, Partition::ExternalRefs),
        Partition::ExternalRefs,
    )?;

    let index = SymbolIndex::build(&nodes);
    let mut outcome = ResolutionOutcome::default();
    let mut call_updates = Vec::new();
    let mut extends_updates = Vec::new();

    for edge in &edges {
        if edge
            .get("is_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }
        let (Some(source), Some(target), Some(edge_type)) = (
            edge.get("source_entity_id").and_then(Value::as_str),
            edge.get("target_entity_id").and_then(Value::as_str),
            edge.get("edge_type").and_then(Value::as_str),
        ) else {
            continue;
        };
        let Some(symbol) = unresolved_symbol(target) else {
            continue;
        };
        let updates = match edge_type {
            "CALLS" => &mut call_updates,
            "EXTENDS" => &mut extends_updates,
            _ => continue,
        };
        match index.lookup(symbol) {
            Ok(entity_id) => updates.push(ResolvedEdgeUpdate {
                source_entity_id: source.to_string(),
                old_target: target.to_string(),
                new_target: entity_id,
            }),
            Err(e) => outcome.failures.push(e),
        }
    }

    // Relative module specifiers stay within the package; bare specifiers
    // name third-party modules this pass cannot see.
    let mut ref_updates = Vec::new();
    for r in &refs {
        if r.get("is_deleted").and_then(Value::as_bool).unwrap_or(false)
            || r.get("is_resolved").and_then(Value::as_bool).unwrap_or(false)
        {
            continue;
        }
        let (Some(source), Some(specifier), Some(symbol)) = (
            r.get("source_entity_id").and_then(Value::as_str),
            r.get("module_specifier").and_then(Value::as_str),
            r.get("imported_symbol").and_then(Value::as_str),
        ) else {
            continue;
        };
        if !specifier.starts_with('.') || symbol == "*" || symbol == "default" {
            continue;
        }
        match index.lookup_exported(symbol) {
            Ok(entity_id) => ref_updates.push(ResolvedRefUpdate {
                source_entity_id: source.to_string(),
                module_specifier: specifier.to_string(),
                imported_symbol: symbol.to_string(),
                target_entity_id: entity_id,
            }),
            Err(e) => outcome.failures.push(e),
        }
    }

    let writer = SeedWriter::new(package_root);
    outcome.resolved_call_edges = writer.update_resolved_call_edges(&call_updates, branch)?;
    outcome.resolved_extends_edges =
        writer.update_resolved_extends_edges(&extends_updates, branch)?;
    outcome.resolved_refs = writer.update_resolved_refs(&ref_updates, branch)?;

    debug!(
        calls = outcome.resolved_call_edges,
        extends = outcome.resolved_extends_edges,
        refs = outcome.resolved_refs,
        failures = outcome.failures.len(),
        "resolver pass finished"
    );
    Ok(outcome)
}

/// Convenience: resolve the base branch.
pub fn resolve_base(package_root: &Path) -> Result<ResolutionOutcome, StorageError> {
    resolve_package(package_root, BASE_BRANCH)
}
