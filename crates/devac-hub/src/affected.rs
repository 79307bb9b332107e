//! Cross-package affected-repo analysis.
//!
//! Traces incoming edges and external refs from other packages into a set of
//! entity IDs and returns the transitive set of affected repos.

use crate::db::FederationHub;
use devac_core::entity_id::EntityId;
use devac_core::error::HubError;
use devac_core::schema::Partition;
use devac_seed::layout;
use devac_seed::partition::read_rows;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;
use tracing::debug;

/// Result of [`FederationHub::get_affected_repos`].
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedReport {
    pub affected_repos: Vec<String>,
    pub total_affected: usize,
    pub analysis_time_ms: u64,
}

/// One incoming dependency: some entity in `repo_id` points at `target`.
struct Incoming {
    repo_id: String,
    source_entity_id: String,
}

impl FederationHub {
    /// Compute the transitive set of repos with edges or refs into the given
    /// entities.
    pub fn get_affected_repos(&self, entity_ids: &[String]) -> Result<AffectedReport, HubError> {
        let started = Instant::now();

        // Reverse index over every active package's edges and refs.
        let mut incoming: HashMap<String, Vec<Incoming>> = HashMap::new();
        for (repo_id, dir) in self.active_packages()? {
            let seed_root = layout::seed_root(&dir);
            for (partition, target_col) in [
                (Partition::Edges, "target_entity_id"),
                (Partition::ExternalRefs, "target_entity_id"),
            ] {
                let path = layout::partition_path(&seed_root, layout::BASE_BRANCH, partition);
                for row in read_rows(&path, partition)? {
                    if row
                        .get("is_deleted")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    let Some(target) = row.get(target_col).and_then(Value::as_str) else {
                        continue;
                    };
                    let Some(source) = row.get("source_entity_id").and_then(Value::as_str)
                    else {
                        continue;
                    };
                    incoming.entry(target.to_string()).or_default().push(Incoming {
                        repo_id: repo_id.clone(),
                        source_entity_id: source.to_string(),
                    });
                }
            }
        }

        // Repos owning the seed entities themselves are not "affected";
        // only other repos reaching into them are.
        let origin_repos: BTreeSet<String> = entity_ids
            .iter()
            .filter_map(|id| EntityId::parse(id))
            .map(|id| id.repo)
            .collect();

        let mut affected: BTreeSet<String> = BTreeSet::new();
        let mut visited: HashSet<String> = entity_ids.iter().cloned().collect();
        let mut frontier: Vec<String> = entity_ids.to_vec();

        while let Some(target) = frontier.pop() {
            let Some(dependents) = incoming.get(&target) else {
                continue;
            };
            for dep in dependents {
                if !origin_repos.contains(&dep.repo_id) {
                    affected.insert(dep.repo_id.clone());
                }
                if visited.insert(dep.source_entity_id.clone()) {
                    frontier.push(dep.source_entity_id.clone());
                }
            }
        }

        let affected_repos: Vec<String> = affected.into_iter().collect();
        let report = AffectedReport {
            total_affected: affected_repos.len(),
            affected_repos,
            analysis_time_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            seeds = entity_ids.len(),
            affected = report.total_affected,
            elapsed_ms = report.analysis_time_ms,
            "affected-repo analysis"
        );
        Ok(report)
    }
}
