use devac_core::model::{
    Edge, EdgeType, Effect, EffectBase, ExternalRef, Node, NodeKind, StructuralParseResult,
};
use devac_seed::layout;
use devac_seed::reader::{EffectFilter, SeedReader};
use devac_seed::writer::{ResolvedEdgeUpdate, ResolvedRefUpdate, SeedWriter};
use tempfile::TempDir;

fn base(effect_id: &str, file: &str) -> EffectBase {
    EffectBase {
        effect_id: effect_id.to_string(),
        source_entity_id: "r:p:function:0011223344556677".to_string(),
        source_file_path: file.to_string(),
        source_line: 5,
        source_column: 2,
        ..EffectBase::default()
    }
}

fn call_effect(effect_id: &str, file: &str, callee: &str) -> Effect {
    Effect::FunctionCall {
        base: base(effect_id, file),
        callee_name: callee.rsplit('.').next().unwrap().to_string(),
        callee_qualified_name: callee.to_string(),
        is_method_call: callee.contains('.'),
        is_async: false,
        is_constructor: false,
        argument_count: 1,
        is_external: false,
        external_module: None,
    }
}

fn node(entity_id: &str, name: &str, file: &str) -> Node {
    let mut node = Node::new(entity_id, name, name, NodeKind::Function, file);
    node.start_line = 1;
    node.end_line = 10;
    node.updated_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    node
}

fn result_for(file: &str, hash: &str, effects: Vec<Effect>) -> StructuralParseResult {
    let mut result = StructuralParseResult::empty(file, hash);
    result.nodes.push(node(&format!("r:p:function:{hash}"), "f", file));
    result.effects = effects;
    result
}

#[test]
fn write_then_read_returns_exactly_the_effects() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    let effects = vec![
        call_effect("fx-1", "/src/a.ts", "db.insert"),
        call_effect("fx-2", "/src/a.ts", "logger.info"),
        Effect::Store {
            base: base("fx-3", "/src/a.ts"),
            store_type: devac_core::model::StoreType::Database,
            operation: "insert".to_string(),
            target_resource: "users".to_string(),
            provider: Some("postgres".to_string()),
        },
    ];
    let result = result_for("/src/a.ts", "h1", effects.clone());
    writer.write_file(&result, "base").unwrap();

    let reader = SeedReader::new(tmp.path());
    let page = reader.read_effects(&EffectFilter::default()).unwrap();
    assert_eq!(page.total_count, 3);
    assert!(!page.has_more);

    // Same effects, modulo the branch/hash stamp the writer applies.
    let mut expected = effects;
    for e in &mut expected {
        let b = e.base_mut();
        b.branch = "base".to_string();
        b.source_file_hash = "h1".to_string();
    }
    assert_eq!(page.effects, expected);
}

#[test]
fn delete_file_leaves_only_other_files() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(
            &result_for("/src/a.ts", "ha", vec![call_effect("fx-a", "/src/a.ts", "a")]),
            "base",
        )
        .unwrap();
    writer
        .write_file(
            &result_for("/src/b.ts", "hb", vec![call_effect("fx-b", "/src/b.ts", "b")]),
            "base",
        )
        .unwrap();
    writer.delete_files(&["/src/a.ts".to_string()], "base").unwrap();

    let reader = SeedReader::new(tmp.path());
    let all = reader.read_effects(&EffectFilter::default()).unwrap();
    assert_eq!(all.total_count, 1);
    assert_eq!(all.effects[0].base().source_file_path, "/src/b.ts");

    let a_only = reader
        .read_effects(&EffectFilter {
            source_file_path: Some("/src/a.ts".to_string()),
            ..EffectFilter::default()
        })
        .unwrap();
    assert_eq!(a_only.total_count, 0);
    assert!(a_only.effects.is_empty());
}

#[test]
fn effect_filters_compose() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    let mut external = call_effect("fx-ext", "/src/a.ts", "axios.get");
    if let Effect::FunctionCall {
        is_external,
        external_module,
        ..
    } = &mut external
    {
        *is_external = true;
        *external_module = Some("axios".to_string());
    }
    writer
        .write_file(
            &result_for(
                "/src/a.ts",
                "h1",
                vec![
                    call_effect("fx-1", "/src/a.ts", "db.insert"),
                    external,
                    Effect::Condition {
                        base: base("fx-c", "/src/a.ts"),
                        expression: Some("x > 0".to_string()),
                    },
                ],
            ),
            "base",
        )
        .unwrap();

    let reader = SeedReader::new(tmp.path());
    assert_eq!(reader.read_function_calls().unwrap().total_count, 2);
    assert_eq!(reader.read_external_calls().unwrap().total_count, 1);
    assert_eq!(reader.read_by_type("Condition").unwrap().total_count, 1);

    let by_pattern = reader
        .read_effects(&EffectFilter {
            callee_name_pattern: Some("db.ins".to_string()),
            ..EffectFilter::default()
        })
        .unwrap();
    assert_eq!(by_pattern.total_count, 1);
    assert_eq!(
        by_pattern.effects[0].base().effect_id,
        "fx-1".to_string()
    );
}

#[test]
fn pagination_reports_has_more() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    let effects: Vec<Effect> = (0..5)
        .map(|i| call_effect(&format!("fx-{i}"), "/src/a.ts", "f"))
        .collect();
    writer
        .write_file(&result_for("/src/a.ts", "h1", effects), "base")
        .unwrap();

    let reader = SeedReader::new(tmp.path());
    let page = reader
        .read_effects(&EffectFilter {
            limit: Some(2),
            offset: 2,
            ..EffectFilter::default()
        })
        .unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.effects.len(), 2);
    assert!(page.has_more);

    let last = reader
        .read_effects(&EffectFilter {
            limit: Some(2),
            offset: 4,
            ..EffectFilter::default()
        })
        .unwrap();
    assert_eq!(last.effects.len(), 1);
    assert!(!last.has_more);
}

#[test]
fn sql_query_sees_partition_views() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(
            &result_for("/src/a.ts", "h1", vec![call_effect("fx", "/src/a.ts", "f")]),
            "base",
        )
        .unwrap();

    let reader = SeedReader::new(tmp.path());
    let result = reader
        .query("SELECT COUNT(*) AS n FROM nodes WHERE is_deleted = 0")
        .unwrap();
    assert_eq!(result.columns, vec!["n"]);
    assert_eq!(result.rows[0][0], serde_json::json!(1));

    let joined = reader
        .query(
            "SELECT e.effect_id FROM effects e \
             JOIN nodes n ON n.file_path = e.source_file_path",
        )
        .unwrap();
    assert_eq!(joined.rows.len(), 1);
}

#[test]
fn resolver_pass_touches_only_matching_rows() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());

    let mut result = result_for("/src/a.ts", "h1", Vec::new());
    result.edges = vec![
        Edge {
            source_entity_id: "r:p:class:aaaa".to_string(),
            target_entity_id: "unresolved:BaseService".to_string(),
            edge_type: EdgeType::Extends,
            source_file_path: "/src/a.ts".to_string(),
            source_line: 1,
            source_column: 0,
            properties: Default::default(),
            source_file_hash: String::new(),
            branch: String::new(),
            is_deleted: false,
        },
        Edge {
            source_entity_id: "r:p:method:bbbb".to_string(),
            target_entity_id: "unresolved:helper".to_string(),
            edge_type: EdgeType::Calls,
            source_file_path: "/src/a.ts".to_string(),
            source_line: 3,
            source_column: 4,
            properties: Default::default(),
            source_file_hash: String::new(),
            branch: String::new(),
            is_deleted: false,
        },
    ];
    result.external_refs = vec![ExternalRef {
        source_entity_id: "r:p:module:cccc".to_string(),
        module_specifier: "./base".to_string(),
        imported_symbol: "BaseService".to_string(),
        local_alias: None,
        import_style: Default::default(),
        is_type_only: false,
        is_reexport: false,
        export_alias: None,
        target_entity_id: None,
        is_resolved: false,
        source_file_path: "/src/a.ts".to_string(),
        source_line: 1,
        source_column: 0,
        source_file_hash: String::new(),
        branch: String::new(),
        is_deleted: false,
    }];
    writer.write_file(&result, "base").unwrap();

    let seed_root = layout::seed_root(tmp.path());
    let nodes_before =
        std::fs::read(layout::partition_path(&seed_root, "base", devac_core::schema::Partition::Nodes))
            .unwrap();

    let changed = writer
        .update_resolved_call_edges(
            &[ResolvedEdgeUpdate {
                source_entity_id: "r:p:method:bbbb".to_string(),
                old_target: "unresolved:helper".to_string(),
                new_target: "r:p:function:dddd".to_string(),
            }],
            "base",
        )
        .unwrap();
    assert_eq!(changed, 1);

    // Non-edge partitions are bitwise untouched.
    let nodes_after =
        std::fs::read(layout::partition_path(&seed_root, "base", devac_core::schema::Partition::Nodes))
            .unwrap();
    assert_eq!(nodes_before, nodes_after);

    let reader = SeedReader::new(tmp.path());
    let edges = reader
        .query("SELECT edge_type, target_entity_id FROM edges ORDER BY source_line")
        .unwrap();
    // EXTENDS edge untouched, CALLS edge rewritten.
    assert_eq!(edges.rows[0][1], serde_json::json!("unresolved:BaseService"));
    assert_eq!(edges.rows[1][1], serde_json::json!("r:p:function:dddd"));

    // Ref resolution flips is_resolved and sets the target.
    writer
        .update_resolved_refs(
            &[ResolvedRefUpdate {
                source_entity_id: "r:p:module:cccc".to_string(),
                module_specifier: "./base".to_string(),
                imported_symbol: "BaseService".to_string(),
                target_entity_id: "r:p:class:eeee".to_string(),
            }],
            "base",
        )
        .unwrap();
    let refs = reader
        .query("SELECT is_resolved, target_entity_id FROM external_refs")
        .unwrap();
    assert_eq!(refs.rows[0][0], serde_json::json!(1));
    assert_eq!(refs.rows[0][1], serde_json::json!("r:p:class:eeee"));
}

#[test]
fn statistics_track_live_rows() {
    let tmp = TempDir::new().unwrap();
    let writer = SeedWriter::new(tmp.path());
    writer
        .write_file(
            &result_for("/src/a.ts", "h1", vec![call_effect("fx", "/src/a.ts", "f")]),
            "base",
        )
        .unwrap();

    let reader = SeedReader::new(tmp.path());
    let stats = reader.get_statistics().unwrap();
    assert_eq!(stats.node_count, 1);
    assert_eq!(stats.effect_count, 1);
    assert_eq!(stats.file_count, 1);

    writer.delete_files(&["/src/a.ts".to_string()], "base").unwrap();
    let stats = reader.get_statistics().unwrap();
    assert_eq!(stats.node_count, 0);
    assert_eq!(stats.file_count, 0);
}
