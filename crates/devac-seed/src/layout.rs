//! On-disk layout of a seed relative to its package root.

use devac_core::schema::Partition;
use std::path::{Path, PathBuf};

const SEED_DIR: &str = ".devac/seed";
const BRANCHES_DIR: &str = "branches";

/// The reserved base-branch name.
pub const BASE_BRANCH: &str = "base";

/// Seed root for a package root.
pub fn seed_root(package_root: &Path) -> PathBuf {
    package_root.join(SEED_DIR)
}

/// Directory holding one branch's partitions.
pub fn branch_dir(seed_root: &Path, branch: &str) -> PathBuf {
    if branch == BASE_BRANCH {
        seed_root.join(BASE_BRANCH)
    } else {
        seed_root.join(BRANCHES_DIR).join(branch)
    }
}

/// Path of one partition file within a branch.
pub fn partition_path(seed_root: &Path, branch: &str, partition: Partition) -> PathBuf {
    branch_dir(seed_root, branch).join(partition.file_name())
}

/// Path of a branch's `meta.json`.
pub fn meta_path(seed_root: &Path, branch: &str) -> PathBuf {
    branch_dir(seed_root, branch).join("meta.json")
}

/// Whether a seed exists (has a committed base branch).
pub fn seed_exists(package_root: &Path) -> bool {
    meta_path(&seed_root(package_root), BASE_BRANCH).exists()
}

/// Names of feature branches present in a seed.
pub fn list_branches(seed_root: &Path) -> Vec<String> {
    let mut branches = Vec::new();
    let dir = seed_root.join(BRANCHES_DIR);
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                branches.push(name.to_string());
            }
        }
    }
    branches.sort();
    branches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_and_feature_branches_map_to_distinct_dirs() {
        let root = PathBuf::from("/pkg/.devac/seed");
        assert_eq!(branch_dir(&root, "base"), root.join("base"));
        assert_eq!(
            branch_dir(&root, "feature-x"),
            root.join("branches").join("feature-x")
        );
    }

    #[test]
    fn partition_paths_use_schema_file_names() {
        let root = PathBuf::from("/pkg/.devac/seed");
        assert_eq!(
            partition_path(&root, "base", Partition::Nodes),
            root.join("base").join("nodes.parquet")
        );
        assert_eq!(
            partition_path(&root, "base", Partition::ExternalRefs),
            root.join("base").join("external_refs.parquet")
        );
    }

    #[test]
    fn seed_root_is_under_devac() {
        assert_eq!(
            seed_root(Path::new("/repo/pkg")),
            PathBuf::from("/repo/pkg/.devac/seed")
        );
    }
}
