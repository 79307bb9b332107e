use devac_core::model::{Edge, EdgeType, Node, NodeKind, StructuralParseResult};
use devac_hub::{FederationHub, HubOptions};
use devac_parser::registry::ParseOptions;
use devac_parser::ParserOrchestrator;
use devac_seed::writer::SeedWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn make_node(entity_id: &str, name: &str, file: &str) -> Node {
    let mut node = Node::new(entity_id, name, name, NodeKind::Function, file);
    node.start_line = 1;
    node.end_line = 5;
    node.updated_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    node
}

/// Create a repo dir with a package.json and a seeded package at its root.
fn make_repo(parent: &Path, dir_name: &str, pkg_name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> PathBuf {
    let root = parent.join(dir_name);
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join("package.json"),
        format!(r#"{{"name": "{pkg_name}"}}"#),
    )
    .unwrap();

    let file = nodes
        .first()
        .map(|n| n.file_path.clone())
        .unwrap_or_else(|| "/src/empty.ts".to_string());
    let mut result = StructuralParseResult::empty(file, format!("hash-{pkg_name}"));
    result.nodes = nodes;
    result.edges = edges;
    SeedWriter::new(&root).write_file(&result, "base").unwrap();
    root
}

fn open_hub(tmp: &TempDir) -> FederationHub {
    FederationHub::open(&tmp.path().join("hub.db"), HubOptions::default()).unwrap()
}

#[test]
fn union_count_equals_sum_of_active_package_counts() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);

    let repo_a = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![
            make_node("package/alpha::function:01", "a1", "/src/a.ts"),
            make_node("package/alpha::function:02", "a2", "/src/a.ts"),
        ],
        Vec::new(),
    );
    let repo_b = make_repo(
        tmp.path(),
        "repo-b",
        "beta",
        vec![
            make_node("package/beta::function:01", "b1", "/src/b.ts"),
            make_node("package/beta::function:02", "b2", "/src/b.ts"),
            make_node("package/beta::function:03", "b3", "/src/b.ts"),
        ],
        Vec::new(),
    );
    hub.register_repo(&repo_a).unwrap();
    hub.register_repo(&repo_b).unwrap();

    let result = hub.query("SELECT COUNT(*) FROM nodes").unwrap();
    assert_eq!(result.rows[0][0], serde_json::json!(5));

    // Per-repo seed stats agree with the union.
    let repos = hub.list_repos().unwrap();
    assert_eq!(repos.len(), 2);

    // Re-registering the same repo never duplicates.
    hub.register_repo(&repo_a).unwrap();
    let result = hub.query("SELECT COUNT(*) FROM nodes").unwrap();
    assert_eq!(result.rows[0][0], serde_json::json!(5));
    assert_eq!(hub.list_repos().unwrap().len(), 2);
}

#[test]
fn query_cache_memoizes_and_refresh_empties_it() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);
    let repo = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo).unwrap();
    assert_eq!(hub.cache_size(), 0);

    let first = hub.query_detailed("SELECT COUNT(*) FROM nodes").unwrap();
    assert!(!first.from_cache);
    assert_eq!(hub.cache_size(), 1);

    let second = hub.query_detailed("SELECT COUNT(*) FROM nodes").unwrap();
    assert!(second.from_cache);
    assert_eq!(second.result.rows, first.result.rows);

    let manifest = devac_hub::manifest::Manifest::read(&repo).unwrap().unwrap();
    hub.refresh_repo(&manifest.repo_id).unwrap();
    assert_eq!(hub.cache_size(), 0);

    let third = hub.query_detailed("SELECT COUNT(*) FROM nodes").unwrap();
    assert!(!third.from_cache);
    assert_eq!(third.result.rows, first.result.rows);
}

#[test]
fn affected_repos_of_nonexistent_entity_is_empty() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);
    let repo_a = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    let repo_b = make_repo(
        tmp.path(),
        "repo-b",
        "beta",
        vec![make_node("package/beta::function:01", "b1", "/src/b.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo_a).unwrap();
    hub.register_repo(&repo_b).unwrap();

    let report = hub
        .get_affected_repos(&["package/none::function:99".to_string()])
        .unwrap();
    assert!(report.affected_repos.is_empty());
    assert_eq!(report.total_affected, 0);
}

#[test]
fn cross_repo_edges_mark_dependent_repos_affected() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);

    let target_id = "package/alpha::function:01".to_string();
    let repo_a = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node(&target_id, "shared", "/src/a.ts")],
        Vec::new(),
    );
    // beta calls into alpha's entity.
    let edge = Edge {
        source_entity_id: "package/beta::function:07".to_string(),
        target_entity_id: target_id.clone(),
        edge_type: EdgeType::Calls,
        source_file_path: "/src/b.ts".to_string(),
        source_line: 3,
        source_column: 0,
        properties: Default::default(),
        source_file_hash: String::new(),
        branch: String::new(),
        is_deleted: false,
    };
    let repo_b = make_repo(
        tmp.path(),
        "repo-b",
        "beta",
        vec![make_node("package/beta::function:07", "caller", "/src/b.ts")],
        vec![edge],
    );
    hub.register_repo(&repo_a).unwrap();
    hub.register_repo(&repo_b).unwrap();

    let report = hub.get_affected_repos(&[target_id]).unwrap();
    assert_eq!(report.affected_repos, vec!["package/beta".to_string()]);
    assert_eq!(report.total_affected, 1);
}

#[test]
fn sync_marks_deleted_repo_missing_and_union_drops_its_rows() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);
    let repo_a = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    let repo_b = make_repo(
        tmp.path(),
        "repo-b",
        "beta",
        vec![make_node("package/beta::function:01", "b1", "/src/b.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo_a).unwrap();
    hub.register_repo(&repo_b).unwrap();

    let before = hub.query("SELECT COUNT(*) FROM nodes").unwrap();
    assert_eq!(before.rows[0][0], serde_json::json!(2));

    std::fs::remove_dir_all(&repo_a).unwrap();
    let statuses = hub.sync().unwrap();
    let alpha = statuses
        .iter()
        .find(|r| r.repo_id == "package/alpha")
        .unwrap();
    assert_eq!(alpha.status, devac_hub::db::RepoStatus::Missing);

    let after = hub.query("SELECT COUNT(*) FROM nodes").unwrap();
    assert_eq!(after.rows[0][0], serde_json::json!(1));
}

#[test]
fn rewritten_seed_reads_as_stale_on_sync() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);
    let repo = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo).unwrap();

    // A writer updates the seed behind the hub's back.
    let mut result = StructuralParseResult::empty("/src/new.ts", "hash-new");
    result.nodes = vec![make_node("package/alpha::function:02", "a2", "/src/new.ts")];
    SeedWriter::new(&repo).write_file(&result, "base").unwrap();

    let statuses = hub.sync().unwrap();
    assert_eq!(statuses[0].status, devac_hub::db::RepoStatus::Stale);

    // Refreshing re-reads stats and restores active status.
    hub.refresh_repo("package/alpha").unwrap();
    let statuses = hub.sync().unwrap();
    assert_eq!(statuses[0].status, devac_hub::db::RepoStatus::Active);
}

#[test]
fn expired_deadline_returns_empty_not_partial() {
    let tmp = TempDir::new().unwrap();
    let mut hub = FederationHub::open(
        &tmp.path().join("hub.db"),
        HubOptions {
            query_deadline: Some(std::time::Duration::ZERO),
            ..HubOptions::default()
        },
    )
    .unwrap();
    let repo = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo).unwrap();

    let outcome = hub.query_detailed("SELECT COUNT(*) FROM nodes").unwrap();
    assert!(outcome.deadline_exceeded);
    assert!(outcome.result.rows.is_empty());
    // Expired results are never cached.
    assert_eq!(hub.cache_size(), 0);
}

#[test]
fn unregister_rejects_unknown_and_removes_known() {
    let tmp = TempDir::new().unwrap();
    let mut hub = open_hub(&tmp);
    assert!(hub.unregister_repo("package/ghost").is_err());

    let repo = make_repo(
        tmp.path(),
        "repo-a",
        "alpha",
        vec![make_node("package/alpha::function:01", "a1", "/src/a.ts")],
        Vec::new(),
    );
    hub.register_repo(&repo).unwrap();
    hub.unregister_repo("package/alpha").unwrap();
    assert!(hub.list_repos().unwrap().is_empty());
    let result = hub.query("SELECT COUNT(*) FROM nodes").unwrap();
    assert_eq!(result.rows[0][0], serde_json::json!(0));
}

#[test]
fn parse_seed_register_query_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("repo");
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("package.json"), r#"{"name": "e2e"}"#).unwrap();
    std::fs::write(
        root.join("src/service.ts"),
        "export class UserService extends BaseService {\n\
         \u{20} get_user(id) { return this.db.find(id); }\n\
         }\n",
    )
    .unwrap();

    let orchestrator = ParserOrchestrator::new(ParseOptions {
        repo: "package/e2e".to_string(),
        package_path: String::new(),
        ..ParseOptions::default()
    });
    let report = orchestrator.parse_package(&root, &[], &[]);
    assert_eq!(report.results.len(), 1);

    let writer = SeedWriter::new(&root);
    for result in &report.results {
        writer.write_file(result, "base").unwrap();
    }

    let mut hub = open_hub(&tmp);
    hub.register_repo(&root).unwrap();

    let classes = hub
        .query("SELECT name, kind FROM nodes WHERE kind = 'class'")
        .unwrap();
    assert_eq!(classes.rows.len(), 1);
    assert_eq!(classes.rows[0][0], serde_json::json!("UserService"));

    let extends = hub
        .query("SELECT target_entity_id FROM edges WHERE edge_type = 'EXTENDS'")
        .unwrap();
    assert_eq!(
        extends.rows[0][0],
        serde_json::json!("unresolved:BaseService")
    );
}
