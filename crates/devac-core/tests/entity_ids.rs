use devac_core::entity_id::EntityId;
use devac_core::model::NodeKind;
use std::collections::HashSet;

const KINDS: [NodeKind; 4] = [
    NodeKind::Function,
    NodeKind::Method,
    NodeKind::Class,
    NodeKind::Variable,
];

#[test]
fn no_collisions_over_ten_thousand_tuples() {
    let mut seen = HashSet::new();
    let mut total = 0usize;

    for file in 0..50 {
        for name in 0..50 {
            for kind in KINDS {
                let id = EntityId::generate(
                    "github.com/org/repo",
                    "packages/core",
                    kind,
                    &format!("src/module_{file}.ts"),
                    &format!("Outer{file}.member_{name}"),
                );
                assert!(
                    seen.insert(id.to_string()),
                    "collision for file {file} name {name} kind {kind:?}"
                );
                total += 1;
            }
        }
    }

    assert!(total >= 10_000);
    assert_eq!(seen.len(), total);
}

#[test]
fn generation_is_stable_across_invocations() {
    for i in 0..100 {
        let scoped = format!("Service.handler_{i}");
        let a = EntityId::generate("gh/o/r", "pkg", NodeKind::Method, "src/s.ts", &scoped);
        let b = EntityId::generate("gh/o/r", "pkg", NodeKind::Method, "src/s.ts", &scoped);
        assert_eq!(a.to_string(), b.to_string());
    }
}

#[test]
fn every_generated_id_parses_back() {
    for i in 0..100 {
        let id = EntityId::generate(
            "gitlab.com/team/proj",
            "services/api",
            NodeKind::Function,
            &format!("src/handlers/h{i}.ts"),
            &format!("handle_{i}"),
        );
        let parsed = EntityId::parse(&id.to_string()).expect("generated ID must parse");
        assert_eq!(parsed.repo, "gitlab.com/team/proj");
        assert_eq!(parsed.package_path, "services/api");
        assert_eq!(parsed.kind, NodeKind::Function);
    }
}

#[test]
fn scope_hash_is_sixteen_hex_chars() {
    let id = EntityId::generate("r", "p", NodeKind::Class, "a.ts", "C");
    assert_eq!(id.scope_hash.len(), 16);
    assert!(id.scope_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
