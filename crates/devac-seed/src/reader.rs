//! Seed reader: queryable relations and a filtered effect iterator.
//!
//! Each call materializes the current partitions into a scratch connection
//! whose views are named exactly after the partitions; the connection (and
//! its views) is torn down when the call returns. Readers never take the
//! seed lock: they observe whatever the last commit point made durable.

use crate::layout::{self, BASE_BRANCH};
use crate::meta::{SeedMeta, SeedStatistics};
use crate::partition::{from_rows, read_rows};
use crate::scratch::{QueryResult, Scratch, like_fragment, sql_quote};
use devac_core::error::StorageError;
use devac_core::model::Effect;
use devac_core::schema::{Partition, SCHEMA_VERSION};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Filter for [`SeedReader::read_effects`].
#[derive(Debug, Clone, Default)]
pub struct EffectFilter {
    pub effect_type: Option<String>,
    pub source_entity_id: Option<String>,
    /// Matches Send targets and Store/Retrieve resources.
    pub target_entity_id: Option<String>,
    pub source_file_path: Option<String>,
    pub is_external: Option<bool>,
    /// Substring match on callee name or qualified name.
    pub callee_name_pattern: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One page of filtered effects.
#[derive(Debug, Clone, Default)]
pub struct EffectPage {
    pub effects: Vec<Effect>,
    pub total_count: usize,
    pub has_more: bool,
}

/// Reader handle for one package's seed branch.
pub struct SeedReader {
    seed_root: PathBuf,
    branch: String,
}

impl SeedReader {
    pub fn new(package_root: &Path) -> Self {
        Self::for_branch(package_root, BASE_BRANCH)
    }

    pub fn for_branch(package_root: &Path, branch: &str) -> Self {
        Self {
            seed_root: layout::seed_root(package_root),
            branch: branch.to_string(),
        }
    }

    pub fn from_seed_root(seed_root: &Path, branch: &str) -> Self {
        Self {
            seed_root: seed_root.to_path_buf(),
            branch: branch.to_string(),
        }
    }

    /// Execute SQL against views named after the partitions.
    pub fn query(&self, sql: &str) -> Result<QueryResult, StorageError> {
        self.check_schema()?;
        let mut scratch = Scratch::open()?;
        for partition in Partition::ALL {
            let rows = self.load_partition(partition)?;
            scratch.load(partition.table_name(), partition, &rows)?;
        }
        scratch.query(sql)
    }

    /// Filtered, paginated effect read.
    pub fn read_effects(&self, filter: &EffectFilter) -> Result<EffectPage, StorageError> {
        self.check_schema()?;
        let mut scratch = Scratch::open()?;
        let rows = self.load_partition(Partition::Effects)?;
        scratch.load("effects", Partition::Effects, &rows)?;

        let condition = build_condition(filter);
        let total_sql = format!("SELECT COUNT(*) FROM effects WHERE {condition}");
        let total = scratch.query(&total_sql)?;
        let total_count = total
            .rows
            .first()
            .and_then(|r| r.first())
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        // LIMIT -1 is SQLite's "no limit"; OFFSET still applies.
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let page_sql = format!(
            "SELECT {} FROM effects WHERE {condition} ORDER BY rowid LIMIT {} OFFSET {}",
            Partition::Effects.column_names().join(", "),
            limit,
            filter.offset,
        );
        let page = scratch.dump_sql(&page_sql, Partition::Effects)?;
        let effects: Vec<Effect> = from_rows(page)?;
        let has_more = filter.offset + effects.len() < total_count;

        Ok(EffectPage {
            effects,
            total_count,
            has_more,
        })
    }

    pub fn read_by_type(&self, effect_type: &str) -> Result<EffectPage, StorageError> {
        self.read_effects(&EffectFilter {
            effect_type: Some(effect_type.to_string()),
            ..EffectFilter::default()
        })
    }

    pub fn read_by_source_entity(&self, entity_id: &str) -> Result<EffectPage, StorageError> {
        self.read_effects(&EffectFilter {
            source_entity_id: Some(entity_id.to_string()),
            ..EffectFilter::default()
        })
    }

    pub fn read_by_target_entity(&self, entity_id: &str) -> Result<EffectPage, StorageError> {
        self.read_effects(&EffectFilter {
            target_entity_id: Some(entity_id.to_string()),
            ..EffectFilter::default()
        })
    }

    pub fn read_function_calls(&self) -> Result<EffectPage, StorageError> {
        self.read_by_type("FunctionCall")
    }

    /// FunctionCall effects whose callee lives outside the package.
    pub fn read_external_calls(&self) -> Result<EffectPage, StorageError> {
        self.read_effects(&EffectFilter {
            effect_type: Some("FunctionCall".to_string()),
            is_external: Some(true),
            ..EffectFilter::default()
        })
    }

    /// Branch statistics from the committed meta; zeroes for a missing seed.
    pub fn get_statistics(&self) -> Result<SeedStatistics, StorageError> {
        let meta = SeedMeta::read(&layout::meta_path(&self.seed_root, &self.branch))?;
        Ok(meta.map(|m| m.statistics).unwrap_or_default())
    }

    fn load_partition(&self, partition: Partition) -> Result<Vec<Value>, StorageError> {
        let path = layout::partition_path(&self.seed_root, &self.branch, partition);
        read_rows(&path, partition)
    }

    fn check_schema(&self) -> Result<(), StorageError> {
        let path = layout::meta_path(&self.seed_root, &self.branch);
        if let Some(meta) = SeedMeta::read(&path)?
            && meta.schema_version > SCHEMA_VERSION
        {
            return Err(StorageError::SchemaMismatch {
                path,
                expected: SCHEMA_VERSION,
                found: meta.schema_version,
            });
        }
        Ok(())
    }
}

fn build_condition(filter: &EffectFilter) -> String {
    let mut condition = String::from("1 = 1");
    if !filter.include_deleted {
        condition.push_str(" AND is_deleted = 0");
    }
    if let Some(t) = &filter.effect_type {
        let _ = write!(condition, " AND effect_type = {}", sql_quote(t));
    }
    if let Some(id) = &filter.source_entity_id {
        let _ = write!(condition, " AND source_entity_id = {}", sql_quote(id));
    }
    if let Some(id) = &filter.target_entity_id {
        let quoted = sql_quote(id);
        let _ = write!(
            condition,
            " AND (target = {quoted} OR target_resource = {quoted} OR source_resource = {quoted})"
        );
    }
    if let Some(path) = &filter.source_file_path {
        let _ = write!(condition, " AND source_file_path = {}", sql_quote(path));
    }
    if let Some(external) = filter.is_external {
        let _ = write!(condition, " AND is_external = {}", i64::from(external));
    }
    if let Some(pattern) = &filter.callee_name_pattern {
        let like = sql_quote(&format!("%{}%", like_fragment(pattern)));
        let _ = write!(
            condition,
            " AND (callee_name LIKE {like} ESCAPE '\\' \
               OR callee_qualified_name LIKE {like} ESCAPE '\\')"
        );
    }
    condition
}
