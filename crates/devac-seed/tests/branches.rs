use devac_core::model::{Effect, EffectBase, Node, NodeKind, StructuralParseResult};
use devac_seed::layout;
use devac_seed::reader::{EffectFilter, SeedReader};
use devac_seed::writer::SeedWriter;
use tempfile::TempDir;

fn result_for(file: &str, hash: &str, name: &str) -> StructuralParseResult {
    let mut result = StructuralParseResult::empty(file, hash);
    let mut node = Node::new(
        format!("r:p:function:{hash}"),
        name,
        name,
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
            source_line: 2,
            source_column: 0,
            ..EffectBase::default()
        },
        callee_name: "log".to_string(),
        callee_qualified_name: "console.log".to_string(),
        is_method_call: true,
        is_async: false,
        is_constructor: false,
        argument_count: 1,
        is_external: false,
        external_module: None,
    });
    result
}

#[test]
fn branch_writes_leave_base_untouched() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(&result_for("/src/a.ts", "h1", "original"), "base")
        .unwrap();
    writer
        .write_file(&result_for("/src/a.ts", "h2", "changed"), "feature/login")
        .unwrap();

    let base = SeedReader::new(tmp.path());
    let base_nodes = base.query("SELECT name FROM nodes").unwrap();
    assert_eq!(base_nodes.rows[0][0], serde_json::json!("original"));

    let branch = SeedReader::for_branch(tmp.path(), "feature/login");
    let branch_nodes = branch
        .query("SELECT name FROM nodes WHERE is_deleted = 0")
        .unwrap();
    assert_eq!(branch_nodes.rows[0][0], serde_json::json!("changed"));
}

#[test]
fn deleted_branch_rows_are_filtered_unless_opted_in() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    let branch = "feature/x";
    writer
        .write_file(&result_for("/src/a.ts", "h1", "f"), branch)
        .unwrap();
    writer
        .write_file(&result_for("/src/a.ts", "h2", "f"), branch)
        .unwrap();

    let reader = SeedReader::for_branch(tmp.path(), branch);
    let live = reader.read_effects(&EffectFilter::default()).unwrap();
    assert_eq!(live.total_count, 1);
    assert_eq!(live.effects[0].base().source_file_hash, "h2");

    let all = reader
        .read_effects(&EffectFilter {
            include_deleted: true,
            ..EffectFilter::default()
        })
        .unwrap();
    assert_eq!(all.total_count, 2);
}

#[test]
fn delete_branch_discards_without_merging() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(&result_for("/src/a.ts", "h1", "keep"), "base")
        .unwrap();
    writer
        .write_file(&result_for("/src/a.ts", "h2", "drop"), "feature/abandoned")
        .unwrap();

    writer.delete_branch("feature/abandoned").unwrap();
    assert!(
        !layout::branch_dir(&layout::seed_root(tmp.path()), "feature/abandoned").exists()
    );
    // Deleting an absent branch is a no-op, and base never deletes this way.
    writer.delete_branch("feature/abandoned").unwrap();
    writer.delete_branch("base").unwrap();

    let base = SeedReader::new(tmp.path());
    let nodes = base.query("SELECT name FROM nodes").unwrap();
    assert_eq!(nodes.rows[0][0], serde_json::json!("keep"));
}

#[test]
fn branch_listing_tracks_live_branches() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    let seed_root = layout::seed_root(tmp.path());
    assert!(layout::list_branches(&seed_root).is_empty());

    writer
        .write_file(&result_for("/src/a.ts", "h1", "f"), "alpha")
        .unwrap();
    writer
        .write_file(&result_for("/src/a.ts", "h1", "f"), "beta")
        .unwrap();
    assert_eq!(layout::list_branches(&seed_root), vec!["alpha", "beta"]);

    writer.delete_branch("alpha").unwrap();
    assert_eq!(layout::list_branches(&seed_root), vec!["beta"]);
}

#[test]
fn promote_applies_branch_deletions_to_base() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(&result_for("/src/a.ts", "h1", "stays"), "base")
        .unwrap();
    writer
        .write_file(&result_for("/src/gone.ts", "h2", "goes"), "base")
        .unwrap();

    // The branch touches gone.ts only to delete it.
    writer
        .write_file(&result_for("/src/gone.ts", "h3", "goes"), "feat")
        .unwrap();
    writer
        .delete_files(&["/src/gone.ts".to_string()], "feat")
        .unwrap();
    writer.promote_branch("feat").unwrap();

    let base = SeedReader::new(tmp.path());
    let nodes = base
        .query("SELECT name FROM nodes WHERE is_deleted = 0")
        .unwrap();
    assert_eq!(nodes.rows.len(), 1);
    assert_eq!(nodes.rows[0][0], serde_json::json!("stays"));
}
