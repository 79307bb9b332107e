//! Union queries over active package seeds, memoized by exact SQL text.

use crate::db::{FederationHub, db_err};
use devac_core::error::HubError;
use devac_core::schema::Partition;
use devac_seed::layout;
use devac_seed::partition::read_rows;
use devac_seed::scratch::{QueryResult, Scratch};
use std::time::Instant;
use tracing::{debug, trace};

/// Outcome of one hub query.
#[derive(Debug, Clone)]
pub struct HubQueryOutcome {
    pub result: QueryResult,
    /// The caller-supplied deadline expired; `result` is empty, never
    /// partial rows.
    pub deadline_exceeded: bool,
    pub from_cache: bool,
}

/// The union rewrite: a view named after the partition that unions the
/// per-package mirror tables, filtering soft-deleted rows. `package_count`
/// mirrors are named `p0_<name>` .. `p{n-1}_<name>`; an always-empty
/// `p_empty_<name>` table keeps the view valid with zero packages.
pub fn union_view_sql(partition: Partition, package_count: usize) -> String {
    let name = partition.table_name();
    let mut arms = vec![format!("SELECT * FROM p_empty_{name}")];
    for i in 0..package_count {
        arms.push(format!("SELECT * FROM p{i}_{name} WHERE is_deleted = 0"));
    }
    format!("CREATE TEMP VIEW {name} AS {}", arms.join(" UNION ALL "))
}

impl FederationHub {
    /// Execute SQL where unqualified `nodes`/`edges`/`external_refs`/
    /// `effects` references union across all active packages.
    pub fn query(&self, sql: &str) -> Result<QueryResult, HubError> {
        Ok(self.query_detailed(sql)?.result)
    }

    /// [`Self::query`] plus cache/deadline observability.
    pub fn query_detailed(&self, sql: &str) -> Result<HubQueryOutcome, HubError> {
        if let Some(hit) = self.cache.lock().expect("hub cache poisoned").get(sql) {
            trace!(sql, "hub query cache hit");
            return Ok(HubQueryOutcome {
                result: hit.clone(),
                deadline_exceeded: false,
                from_cache: true,
            });
        }

        let deadline = self.query_deadline.map(|d| Instant::now() + d);
        let expired = |deadline: &Option<Instant>| {
            deadline.is_some_and(|d| Instant::now() >= d)
        };

        let packages = self.active_packages()?;
        let mut scratch = Scratch::open()?;
        for (i, (_repo_id, dir)) in packages.iter().enumerate() {
            if expired(&deadline) {
                return Ok(deadline_outcome());
            }
            let seed_root = layout::seed_root(dir);
            for partition in Partition::ALL {
                let path = layout::partition_path(&seed_root, layout::BASE_BRANCH, partition);
                let rows = read_rows(&path, partition)?;
                let table = format!("p{i}_{}", partition.table_name());
                scratch.load(&table, partition, &rows)?;
            }
        }

        for partition in Partition::ALL {
            scratch
                .connection()
                .execute_batch(&partition.create_table_sql(&format!(
                    "p_empty_{}",
                    partition.table_name()
                )))
                .map_err(db_err)?;
            scratch
                .connection()
                .execute_batch(&union_view_sql(partition, packages.len()))
                .map_err(db_err)?;
        }

        if expired(&deadline) {
            return Ok(deadline_outcome());
        }
        debug!(sql, packages = packages.len(), "executing hub union query");
        let result = scratch
            .query(sql)
            .map_err(|e| HubError::QueryCompileFailure {
                detail: e.to_string(),
            })?;

        self.cache
            .lock()
            .expect("hub cache poisoned")
            .insert(sql.to_string(), result.clone());
        Ok(HubQueryOutcome {
            result,
            deadline_exceeded: false,
            from_cache: false,
        })
    }
}

fn deadline_outcome() -> HubQueryOutcome {
    HubQueryOutcome {
        result: QueryResult::default(),
        deadline_exceeded: true,
        from_cache: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_view_covers_every_package_mirror() {
        let sql = union_view_sql(Partition::Nodes, 3);
        assert!(sql.starts_with("CREATE TEMP VIEW nodes AS"));
        assert!(sql.contains("p0_nodes"));
        assert!(sql.contains("p2_nodes"));
        assert!(!sql.contains("p3_nodes"));
        assert_eq!(sql.matches("UNION ALL").count(), 3);
    }

    #[test]
    fn zero_packages_yields_a_valid_empty_view() {
        let sql = union_view_sql(Partition::Effects, 0);
        assert_eq!(
            sql,
            "CREATE TEMP VIEW effects AS SELECT * FROM p_empty_effects"
        );
    }
}
