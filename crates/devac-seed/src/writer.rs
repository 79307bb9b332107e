//! Seed writer: durable, atomic persistence of structural parse results.
//!
//! Every operation runs under the exclusive seed lock and commits through
//! the same protocol: mutate partition mirrors in a scratch connection,
//! encode new Parquet bytes to `*.tmp` siblings, rename over the targets
//! (`meta.json` last), then fsync the branch directory. Either every rename
//! lands or the previous state stays observable.

use crate::layout::{self, BASE_BRANCH};
use crate::lock;
use crate::meta::{SeedMeta, SeedStatistics, bytes_checksum, file_checksum};
use crate::partition::{encode_rows, read_rows, to_rows};
use crate::scratch::{Scratch, sql_quote};
use devac_core::error::{BulkOutcome, StorageError};
use devac_core::model::StructuralParseResult;
use devac_core::schema::Partition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// One row of the `file_hashes` partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHashRow {
    pub file_path: String,
    pub source_file_hash: String,
    pub parse_time_ms: u64,
    #[serde(default)]
    pub parsed_at: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Resolver output for one external ref.
#[derive(Debug, Clone)]
pub struct ResolvedRefUpdate {
    pub source_entity_id: String,
    pub module_specifier: String,
    pub imported_symbol: String,
    pub target_entity_id: String,
}

/// Resolver output for one edge: rewrite `old_target` (usually an
/// `unresolved:` sentinel) to `new_target`.
#[derive(Debug, Clone)]
pub struct ResolvedEdgeUpdate {
    pub source_entity_id: String,
    pub old_target: String,
    pub new_target: String,
}

/// Writer handle for one package's seed.
pub struct SeedWriter {
    seed_root: PathBuf,
    lock_timeout: Duration,
}

impl SeedWriter {
    pub fn new(package_root: &Path) -> Self {
        Self {
            seed_root: layout::seed_root(package_root),
            lock_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn seed_root(&self) -> &Path {
        &self.seed_root
    }

    /// Persist one file's rows into a branch.
    ///
    /// On base the file's previous rows are replaced; on feature branches the
    /// same (path, hash) version is upserted and older versions of the file
    /// are kept with `is_deleted` markers.
    pub fn write_file(
        &self,
        result: &StructuralParseResult,
        branch: &str,
    ) -> Result<(), StorageError> {
        let outcome = self.update_files(std::slice::from_ref(result), branch);
        if outcome.success {
            Ok(())
        } else {
            Err(StorageError::CorruptPartition {
                path: self.seed_root.clone(),
                detail: outcome.error.unwrap_or_else(|| "write failed".to_string()),
            })
        }
    }

    /// Bulk variant of [`Self::write_file`]: one lock, one commit.
    pub fn update_files(&self, results: &[StructuralParseResult], branch: &str) -> BulkOutcome {
        match self.update_files_inner(results, branch) {
            Ok(rows_written) => BulkOutcome {
                success: true,
                error: None,
                files_processed: results.len(),
                files_failed: 0,
                rows_written,
            },
            Err(e) => BulkOutcome {
                success: false,
                error: Some(e.to_string()),
                files_processed: 0,
                files_failed: results.len(),
                rows_written: 0,
            },
        }
    }

    fn update_files_inner(
        &self,
        results: &[StructuralParseResult],
        branch: &str,
    ) -> Result<usize, StorageError> {
        let _guard = lock::acquire(&self.seed_root, self.lock_timeout)?;
        self.recover(branch)?;

        let is_base = branch == BASE_BRANCH;
        let mut rows_written = 0usize;
        let mut partitions = Vec::with_capacity(Partition::ALL.len());

        for partition in Partition::ALL {
            let mut scratch = Scratch::open()?;
            let current = self.read_partition(branch, partition)?;
            scratch.load("part", partition, &current)?;

            let file_col = file_column(partition);
            for result in results {
                if is_base {
                    scratch.execute(
                        &format!("DELETE FROM part WHERE {file_col} = ?1"),
                        &[&result.file_path],
                    )?;
                } else {
                    scratch.execute(
                        &format!(
                            "UPDATE part SET is_deleted = 1 \
                             WHERE {file_col} = ?1 AND source_file_hash <> ?2"
                        ),
                        &[&result.file_path, &result.source_file_hash],
                    )?;
                    scratch.execute(
                        &format!(
                            "DELETE FROM part \
                             WHERE {file_col} = ?1 AND source_file_hash = ?2"
                        ),
                        &[&result.file_path, &result.source_file_hash],
                    )?;
                }
            }

            let mut rows = scratch.dump("part", partition)?;
            for result in results {
                let mut stamped = result.clone();
                stamped.stamp(branch);
                let new_rows = partition_rows(&stamped, partition)?;
                rows_written += new_rows.len();
                rows.extend(new_rows);
            }
            partitions.push((partition, rows));
        }

        self.commit(branch, partitions)?;
        Ok(rows_written)
    }

    /// Remove files from a branch. Base rewrites partitions without their
    /// rows; feature branches mark them `is_deleted`.
    pub fn delete_files(&self, files: &[String], branch: &str) -> Result<(), StorageError> {
        if files.is_empty() {
            return Ok(());
        }
        let _guard = lock::acquire(&self.seed_root, self.lock_timeout)?;
        self.recover(branch)?;

        let is_base = branch == BASE_BRANCH;
        let in_list = files
            .iter()
            .map(|f| sql_quote(f))
            .collect::<Vec<_>>()
            .join(", ");

        let mut partitions = Vec::with_capacity(Partition::ALL.len());
        for partition in Partition::ALL {
            let mut scratch = Scratch::open()?;
            let current = self.read_partition(branch, partition)?;
            scratch.load("part", partition, &current)?;

            let file_col = file_column(partition);
            let sql = if is_base {
                format!("DELETE FROM part WHERE {file_col} IN ({in_list})")
            } else {
                format!("UPDATE part SET is_deleted = 1 WHERE {file_col} IN ({in_list})")
            };
            scratch.execute(&sql, [])?;

            partitions.push((partition, scratch.dump("part", partition)?));
        }
        self.commit(branch, partitions)
    }

    /// Rewrite `target_entity_id`/`is_resolved` on the listed refs,
    /// preserving every other column.
    pub fn update_resolved_refs(
        &self,
        updates: &[ResolvedRefUpdate],
        branch: &str,
    ) -> Result<usize, StorageError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let _guard = lock::acquire(&self.seed_root, self.lock_timeout)?;
        self.recover(branch)?;

        let mut scratch = Scratch::open()?;
        let current = self.read_partition(branch, Partition::ExternalRefs)?;
        scratch.load("part", Partition::ExternalRefs, &current)?;

        let mut changed = 0usize;
        for update in updates {
            changed += scratch.execute(
                "UPDATE part SET target_entity_id = ?1, is_resolved = 1 \
                 WHERE source_entity_id = ?2 AND module_specifier = ?3 \
                   AND imported_symbol = ?4",
                &[
                    &update.target_entity_id,
                    &update.source_entity_id,
                    &update.module_specifier,
                    &update.imported_symbol,
                ],
            )?;
        }

        let rows = scratch.dump("part", Partition::ExternalRefs)?;
        self.commit(branch, vec![(Partition::ExternalRefs, rows)])?;
        Ok(changed)
    }

    /// Rewrite targets on matching CALLS edges only.
    pub fn update_resolved_call_edges(
        &self,
        updates: &[ResolvedEdgeUpdate],
        branch: &str,
    ) -> Result<usize, StorageError> {
        self.update_resolved_edges(updates, "CALLS", branch)
    }

    /// Rewrite targets on matching EXTENDS edges only.
    pub fn update_resolved_extends_edges(
        &self,
        updates: &[ResolvedEdgeUpdate],
        branch: &str,
    ) -> Result<usize, StorageError> {
        self.update_resolved_edges(updates, "EXTENDS", branch)
    }

    fn update_resolved_edges(
        &self,
        updates: &[ResolvedEdgeUpdate],
        edge_type: &str,
        branch: &str,
    ) -> Result<usize, StorageError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let _guard = lock::acquire(&self.seed_root, self.lock_timeout)?;
        self.recover(branch)?;

        let mut scratch = Scratch::open()?;
        let current = self.read_partition(branch, Partition::Edges)?;
        scratch.load("part", Partition::Edges, &current)?;

        let mut changed = 0usize;
        for update in updates {
            changed += scratch.execute(
                "UPDATE part SET target_entity_id = ?1 \
                 WHERE source_entity_id = ?2 AND target_entity_id = ?3 \
                   AND edge_type = ?4",
                rusqlite::params![
                    update.new_target,
                    update.source_entity_id,
                    update.old_target,
                    edge_type,
                ],
            )?;
        }

        let rows = scratch.dump("part", Partition::Edges)?;
        self.commit(branch, vec![(Partition::Edges, rows)])?;
        Ok(changed)
    }

    /// Merge a feature branch into base and remove the branch.
    ///
    /// Files touched on the branch replace their base rows; rows the branch
    /// marked deleted are dropped. Promotion is always explicit.
    pub fn promote_branch(&self, branch: &str) -> Result<(), StorageError> {
        if branch == BASE_BRANCH {
            return Ok(());
        }
        let _guard = lock::acquire(&self.seed_root, self.lock_timeout)?;
        self.recover(BASE_BRANCH)?;
        self.recover(branch)?;

        // Files the branch touched, live or deleted.
        let branch_hashes = self.read_partition(branch, Partition::FileHashes)?;
        let touched: Vec<String> = branch_hashes
            .iter()
            .filter_map(|row| row.get("file_path").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let mut partitions = Vec::with_capacity(Partition::ALL.len());
        for partition in Partition::ALL {
            let file_col = file_column(partition);
            let base_rows = self.read_partition(BASE_BRANCH, partition)?;
            let branch_rows = self.read_partition(branch, partition)?;

            let mut merged: Vec<Value> = base_rows
                .into_iter()
                .filter(|row| {
                    row.get(file_col)
                        .and_then(Value::as_str)
                        .is_none_or(|f| !touched.iter().any(|t| t == f))
                })
                .collect();
            for mut row in branch_rows {
                let deleted = row
                    .get("is_deleted")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if deleted {
                    continue;
                }
                if let Some(map) = row.as_object_mut() {
                    map.insert("branch".to_string(), Value::from(BASE_BRANCH));
                }
                merged.push(row);
            }
            partitions.push((partition, merged));
        }

        self.commit(BASE_BRANCH, partitions)?;
        self.delete_branch(branch)
    }

    /// Remove a feature branch without merging.
    pub fn delete_branch(&self, branch: &str) -> Result<(), StorageError> {
        if branch == BASE_BRANCH {
            return Ok(());
        }
        let dir = layout::branch_dir(&self.seed_root, branch);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    fn read_partition(&self, branch: &str, partition: Partition) -> Result<Vec<Value>, StorageError> {
        let path = layout::partition_path(&self.seed_root, branch, partition);
        read_rows(&path, partition)
    }

    /// Detect and repair a crashed previous commit, then collect stray tmp
    /// files. Runs under the lock at the start of every operation.
    fn recover(&self, branch: &str) -> Result<(), StorageError> {
        let dir = layout::branch_dir(&self.seed_root, branch);
        if !dir.exists() {
            return Ok(());
        }

        let meta_tmp = dir.join("meta.json.tmp");
        if meta_tmp.exists() {
            // The prepare phase finished (meta tmp is written last), so the
            // crash hit mid-rename: roll the commit forward.
            warn!(?dir, "rolling forward interrupted seed commit");
            for partition in Partition::ALL {
                let tmp = dir.join(format!("{}.tmp", partition.file_name()));
                if tmp.exists() {
                    let target = dir.join(partition.file_name());
                    std::fs::rename(&tmp, &target)
                        .map_err(|e| StorageError::AtomicRenameFailed { path: target, source: e })?;
                }
            }
            let meta = dir.join("meta.json");
            std::fs::rename(&meta_tmp, &meta)
                .map_err(|e| StorageError::AtomicRenameFailed { path: meta, source: e })?;
            fsync_dir(&dir)?;
            return Ok(());
        }

        // Prepare never finished: stray tmps are garbage.
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                    debug!(?path, "collecting stray tmp file");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        // A checksum mismatch with no tmp files means a rename batch was
        // interrupted and its tmps already consumed: adopt the on-disk
        // partition set and re-commit a matching meta.
        if let Some(meta) = SeedMeta::read(&dir.join("meta.json"))? {
            let mut mismatch = false;
            for partition in Partition::ALL {
                let recorded = meta.partition_checksums.get(partition.file_name());
                let actual = file_checksum(&dir.join(partition.file_name()))?;
                if recorded.is_some_and(|r| *r != actual) {
                    mismatch = true;
                }
            }
            if mismatch {
                warn!(?dir, "seed checksum mismatch, re-committing meta");
                let mut partitions = Vec::with_capacity(Partition::ALL.len());
                for partition in Partition::ALL {
                    partitions.push((partition, self.read_partition(branch, partition)?));
                }
                self.commit(branch, partitions)?;
            }
        }
        Ok(())
    }

    /// Prepare tmp files for the given partition rows. Partitions not listed
    /// keep their current bytes.
    fn prepare(
        &self,
        branch: &str,
        partitions: Vec<(Partition, Vec<Value>)>,
    ) -> Result<PreparedCommit, StorageError> {
        let dir = layout::branch_dir(&self.seed_root, branch);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let changed: BTreeMap<&'static str, (Partition, Vec<Value>)> = partitions
            .into_iter()
            .map(|(p, rows)| (p.file_name(), (p, rows)))
            .collect();

        let mut statistics = SeedStatistics::default();
        let mut checksums = BTreeMap::new();
        let mut renames = Vec::new();

        for partition in Partition::ALL {
            let target = dir.join(partition.file_name());
            let (bytes, rows_live) = match changed.get(partition.file_name()) {
                Some((p, rows)) => (encode_rows(*p, rows)?, live_count(rows)),
                None => {
                    // Untouched partition: count from disk for statistics.
                    let rows = read_rows(&target, partition)?;
                    (encode_rows(partition, &rows)?, live_count(&rows))
                }
            };

            match partition {
                Partition::Nodes => statistics.node_count = rows_live,
                Partition::Edges => statistics.edge_count = rows_live,
                Partition::ExternalRefs => statistics.ref_count = rows_live,
                Partition::Effects => statistics.effect_count = rows_live,
                Partition::FileHashes => statistics.file_count = rows_live,
            }
            checksums.insert(partition.file_name().to_string(), bytes_checksum(&bytes));

            // Skip files whose committed bytes already match.
            if file_checksum(&target)? == bytes_checksum(&bytes) {
                continue;
            }
            let tmp = dir.join(format!("{}.tmp", partition.file_name()));
            std::fs::write(&tmp, &bytes).map_err(|e| StorageError::io(&tmp, e))?;
            renames.push((tmp, target));
        }

        let meta_path = dir.join("meta.json");
        let previous = SeedMeta::read(&meta_path)?;
        let unchanged = renames.is_empty()
            && previous
                .as_ref()
                .is_some_and(|m| m.partition_checksums == checksums && m.statistics == statistics);
        if unchanged {
            return Ok(PreparedCommit { dir, renames: Vec::new(), skip: true });
        }

        let mut meta = SeedMeta::new(branch, statistics);
        meta.partition_checksums = checksums;
        let meta_tmp = dir.join("meta.json.tmp");
        std::fs::write(&meta_tmp, meta.to_json()?).map_err(|e| StorageError::io(&meta_tmp, e))?;
        renames.push((meta_tmp, meta_path));

        Ok(PreparedCommit { dir, renames, skip: false })
    }

    /// Rename every tmp over its target (meta last) and fsync the directory.
    /// The fsync is the commit point.
    fn finalize(&self, prepared: PreparedCommit) -> Result<(), StorageError> {
        if prepared.skip {
            return Ok(());
        }
        for (tmp, target) in &prepared.renames {
            std::fs::rename(tmp, target).map_err(|e| StorageError::AtomicRenameFailed {
                path: target.clone(),
                source: e,
            })?;
        }
        fsync_dir(&prepared.dir)
    }

    fn commit(
        &self,
        branch: &str,
        partitions: Vec<(Partition, Vec<Value>)>,
    ) -> Result<(), StorageError> {
        let prepared = self.prepare(branch, partitions)?;
        self.finalize(prepared)
    }
}

struct PreparedCommit {
    dir: PathBuf,
    renames: Vec<(PathBuf, PathBuf)>,
    skip: bool,
}

fn fsync_dir(dir: &Path) -> Result<(), StorageError> {
    let handle = std::fs::File::open(dir).map_err(|e| StorageError::io(dir, e))?;
    handle.sync_all().map_err(|e| StorageError::io(dir, e))
}

fn live_count(rows: &[Value]) -> u64 {
    rows.iter()
        .filter(|row| {
            !row.get("is_deleted")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .count() as u64
}

/// Column identifying the originating file in each partition.
fn file_column(partition: Partition) -> &'static str {
    match partition {
        Partition::Nodes | Partition::FileHashes => "file_path",
        Partition::Edges | Partition::ExternalRefs | Partition::Effects => "source_file_path",
    }
}

/// Rows a parse result contributes to one partition.
fn partition_rows(
    result: &StructuralParseResult,
    partition: Partition,
) -> Result<Vec<Value>, StorageError> {
    match partition {
        Partition::Nodes => to_rows(&result.nodes),
        Partition::Edges => to_rows(&result.edges),
        Partition::ExternalRefs => to_rows(&result.external_refs),
        Partition::Effects => to_rows(&result.effects),
        Partition::FileHashes => to_rows(&[FileHashRow {
            file_path: result.file_path.clone(),
            source_file_hash: result.source_file_hash.clone(),
            parse_time_ms: result.parse_time_ms,
            parsed_at: None,
            is_deleted: false,
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devac_core::model::{Effect, EffectBase, Node, NodeKind};
    use tempfile::TempDir;

    fn result_for(file: &str, hash: &str) -> StructuralParseResult {
        let mut result = StructuralParseResult::empty(file, hash);
        let mut node = Node::new(
            format!("r:p:function:{hash}"),
            "f",
            "f",
            NodeKind::Function,
            file,
        );
        node.updated_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        result.nodes.push(node);
        result.effects.push(Effect::FunctionCall {
            base: EffectBase {
                effect_id: format!("fx:{hash}"),
                source_entity_id: format!("r:p:function:{hash}"),
                source_file_path: file.to_string(),
                source_line: 1,
                source_column: 0,
                ..EffectBase::default()
            },
            callee_name: "g".to_string(),
            callee_qualified_name: "g".to_string(),
            is_method_call: false,
            is_async: false,
            is_constructor: false,
            argument_count: 0,
            is_external: false,
            external_module: None,
        });
        result
    }

    fn partition_bytes(writer: &SeedWriter, branch: &str) -> Vec<Vec<u8>> {
        Partition::ALL
            .iter()
            .map(|p| {
                std::fs::read(layout::partition_path(writer.seed_root(), branch, *p))
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn idempotent_rewrite_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        let result = result_for("/src/a.ts", "h1");

        writer.write_file(&result, "base").unwrap();
        let first = partition_bytes(&writer, "base");
        let meta_first =
            std::fs::read(layout::meta_path(writer.seed_root(), "base")).unwrap();

        writer.write_file(&result, "base").unwrap();
        let second = partition_bytes(&writer, "base");
        let meta_second =
            std::fs::read(layout::meta_path(writer.seed_root(), "base")).unwrap();

        assert_eq!(first, second);
        assert_eq!(meta_first, meta_second);
    }

    #[test]
    fn crash_before_rename_leaves_prior_state() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        writer.write_file(&result_for("/src/a.ts", "h1"), "base").unwrap();
        let before = partition_bytes(&writer, "base");

        // Prepare the second write, then "crash" without finalizing. The
        // meta tmp is deliberately removed to model a crash before the
        // prepare phase completed.
        let mut partitions = Vec::new();
        for p in Partition::ALL {
            let mut rows = writer.read_partition("base", p).unwrap();
            let stamped = {
                let mut r = result_for("/src/b.ts", "h2");
                r.stamp("base");
                r
            };
            rows.extend(partition_rows(&stamped, p).unwrap());
            partitions.push((p, rows));
        }
        let prepared = writer.prepare("base", partitions).unwrap();
        let dir = prepared.dir.clone();
        drop(prepared);
        std::fs::remove_file(dir.join("meta.json.tmp")).unwrap();

        // Pre-operation state is still what a reader observes.
        assert_eq!(partition_bytes(&writer, "base"), before);

        // The next write collects the strays and succeeds.
        writer.write_file(&result_for("/src/b.ts", "h2"), "base").unwrap();
        let hashes = writer.read_partition("base", Partition::FileHashes).unwrap();
        assert_eq!(hashes.len(), 2);
        for p in Partition::ALL {
            assert!(!dir.join(format!("{}.tmp", p.file_name())).exists());
        }
    }

    #[test]
    fn crash_mid_rename_rolls_forward() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        writer.write_file(&result_for("/src/a.ts", "h1"), "base").unwrap();

        let mut partitions = Vec::new();
        for p in Partition::ALL {
            let mut rows = writer.read_partition("base", p).unwrap();
            let stamped = {
                let mut r = result_for("/src/b.ts", "h2");
                r.stamp("base");
                r
            };
            rows.extend(partition_rows(&stamped, p).unwrap());
            partitions.push((p, rows));
        }
        let prepared = writer.prepare("base", partitions).unwrap();
        // Rename only the first file, then crash.
        let (tmp_path, target) = prepared.renames[0].clone();
        std::fs::rename(&tmp_path, &target).unwrap();
        let dir = prepared.dir.clone();
        drop(prepared);
        assert!(dir.join("meta.json.tmp").exists());

        // Recovery completes the commit; both files are visible afterwards.
        writer.recover("base").unwrap();
        assert!(!dir.join("meta.json.tmp").exists());
        let hashes = writer.read_partition("base", Partition::FileHashes).unwrap();
        assert_eq!(hashes.len(), 2);
    }

    #[test]
    fn base_delete_removes_rows_branch_delete_marks() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        writer.write_file(&result_for("/src/a.ts", "h1"), "base").unwrap();
        writer.write_file(&result_for("/src/a.ts", "h1"), "feat").unwrap();

        writer.delete_files(&["/src/a.ts".to_string()], "base").unwrap();
        assert!(writer.read_partition("base", Partition::Nodes).unwrap().is_empty());

        writer.delete_files(&["/src/a.ts".to_string()], "feat").unwrap();
        let rows = writer.read_partition("feat", Partition::Nodes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("is_deleted"), Some(&Value::Bool(true)));
    }

    #[test]
    fn branch_upsert_marks_prior_version() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        writer.write_file(&result_for("/src/a.ts", "h1"), "feat").unwrap();
        writer.write_file(&result_for("/src/a.ts", "h2"), "feat").unwrap();

        let rows = writer.read_partition("feat", Partition::Nodes).unwrap();
        assert_eq!(rows.len(), 2);
        let deleted: Vec<bool> = rows
            .iter()
            .map(|r| r.get("is_deleted").and_then(Value::as_bool).unwrap_or(false))
            .collect();
        assert!(deleted.contains(&true) && deleted.contains(&false));

        // Re-writing the same hash replaces in place, no third version.
        writer.write_file(&result_for("/src/a.ts", "h2"), "feat").unwrap();
        assert_eq!(writer.read_partition("feat", Partition::Nodes).unwrap().len(), 2);
    }

    #[test]
    fn promote_merges_and_removes_branch() {
        let tmp = TempDir::new().unwrap();
        let writer = SeedWriter::new(tmp.path());
        writer.write_file(&result_for("/src/a.ts", "h1"), "base").unwrap();
        writer.write_file(&result_for("/src/a.ts", "h2"), "feat").unwrap();
        writer.write_file(&result_for("/src/new.ts", "h3"), "feat").unwrap();

        writer.promote_branch("feat").unwrap();

        let nodes = writer.read_partition("base", Partition::Nodes).unwrap();
        assert_eq!(nodes.len(), 2);
        for row in &nodes {
            assert_eq!(row.get("branch"), Some(&Value::from("base")));
        }
        let hashes = writer.read_partition("base", Partition::FileHashes).unwrap();
        let a = hashes
            .iter()
            .find(|r| r.get("file_path") == Some(&Value::from("/src/a.ts")))
            .unwrap();
        assert_eq!(a.get("source_file_hash"), Some(&Value::from("h2")));
        assert!(!layout::branch_dir(writer.seed_root(), "feat").exists());
    }
}
