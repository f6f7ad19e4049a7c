//! Integration tests for lockfile parsing
//!
//! The same logical tree written as npm v3, yarn classic and pnpm v9 lockfiles
//! must parse into graphs with identical shape.

use std::path::PathBuf;

use lockaudit_scanner::graph::GraphShape;
use lockaudit_scanner::parser::read_lockfile;
use lockaudit_scanner::{AuditError, DependencyGraph, LockfileFormat, PackageKey, parse_lockfile};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn parse_fixture(name: &str) -> DependencyGraph {
    let path = fixture_path(name);
    let format = LockfileFormat::detect_from_path(&path).unwrap();
    let content = read_lockfile(&path, 1024 * 1024).unwrap();
    parse_lockfile(&content, format, name).unwrap()
}

fn key(name: &str, version: &str) -> PackageKey {
    PackageKey::new(name, version)
}

fn expected_shape() -> GraphShape {
    let roots = [key("express", "4.17.1"), key("lodash", "4.17.20")]
        .into_iter()
        .collect();
    let edges = [
        (key("express", "4.17.1"), vec![key("body-parser", "1.19.0"), key("qs", "6.7.0")]),
        (key("body-parser", "1.19.0"), vec![key("qs", "6.7.0")]),
        (key("lodash", "4.17.20"), vec![]),
        (key("qs", "6.7.0"), vec![]),
    ]
    .into_iter()
    .map(|(k, children)| (k, children.into_iter().collect()))
    .collect();
    GraphShape { roots, edges }
}

#[test]
fn test_npm_v3_diamond_shape() {
    assert_eq!(parse_fixture("diamond/package-lock.json").shape(), expected_shape());
}

#[test]
fn test_yarn_classic_diamond_shape() {
    assert_eq!(parse_fixture("diamond/yarn.lock").shape(), expected_shape());
}

#[test]
fn test_pnpm_v9_diamond_shape() {
    assert_eq!(parse_fixture("diamond/pnpm-lock.yaml").shape(), expected_shape());
}

#[test]
fn test_shared_dependency_is_one_node() {
    for name in ["diamond/package-lock.json", "diamond/yarn.lock", "diamond/pnpm-lock.yaml"] {
        let graph = parse_fixture(name);
        assert_eq!(graph.len(), 4, "{name}");
        let qs = graph.lookup("qs", "6.7.0").unwrap();
        let parents = graph
            .all_nodes()
            .filter(|(_, node)| node.children.contains(&qs))
            .count();
        assert_eq!(parents, 2, "{name}");
    }
}

#[test]
fn test_integrity_is_carried_through() {
    for name in ["diamond/package-lock.json", "diamond/yarn.lock", "diamond/pnpm-lock.yaml"] {
        let graph = parse_fixture(name);
        let qs = graph.node(graph.lookup("qs", "6.7.0").unwrap()).unwrap();
        assert_eq!(qs.integrity.as_deref(), Some("sha512-qs"), "{name}");
    }
}

#[test]
fn test_shortest_path_is_deterministic_across_formats() {
    for name in ["diamond/package-lock.json", "diamond/yarn.lock", "diamond/pnpm-lock.yaml"] {
        let graph = parse_fixture(name);
        let qs = graph.lookup("qs", "6.7.0").unwrap();
        let path = graph.shortest_path_from_root(qs).unwrap();
        let keys: Vec<_> = graph.path_keys(&path).iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["express@4.17.1", "qs@6.7.0"], "{name}");

        // 반복 호출도 같은 경로
        assert_eq!(graph.shortest_path_from_root(qs).unwrap(), path);
    }
}

#[test]
fn test_every_node_reachable_from_a_root() {
    for name in ["diamond/package-lock.json", "diamond/yarn.lock", "diamond/pnpm-lock.yaml"] {
        let graph = parse_fixture(name);
        for (id, node) in graph.all_nodes() {
            let path = graph.shortest_path_from_root(id);
            assert!(path.is_some(), "{name}: {} unreachable", node.key());
            if node.is_direct {
                assert_eq!(path.unwrap().len(), 1);
            }
        }
    }
}

#[test]
fn test_format_detection_by_file_name() {
    assert_eq!(
        LockfileFormat::detect_from_path(&fixture_path("diamond/package-lock.json")),
        Some(LockfileFormat::Npm)
    );
    assert_eq!(
        LockfileFormat::detect_from_path(&fixture_path("diamond/yarn.lock")),
        Some(LockfileFormat::Yarn)
    );
    assert_eq!(
        LockfileFormat::detect_from_path(&fixture_path("diamond/pnpm-lock.yaml")),
        Some(LockfileFormat::Pnpm)
    );
}

#[test]
fn test_wrong_format_is_parse_error() {
    let path = fixture_path("diamond/yarn.lock");
    let content = read_lockfile(&path, 1024 * 1024).unwrap();
    let err = parse_lockfile(&content, LockfileFormat::Npm, "yarn.lock").unwrap_err();
    assert!(matches!(err, AuditError::LockfileParse { ref format, .. } if format == "npm"));
}

#[test]
fn test_truncated_lockfile_is_rejected_without_partial_graph() {
    let path = fixture_path("diamond/package-lock.json");
    let content = read_lockfile(&path, 1024 * 1024).unwrap();
    let truncated = &content[..content.len() / 2];
    let err = parse_lockfile(truncated, LockfileFormat::Npm, "package-lock.json").unwrap_err();
    match err {
        AuditError::LockfileParse { location, .. } => assert!(location.starts_with("line ")),
        other => panic!("expected LockfileParse, got {other:?}"),
    }
}

#[test]
fn test_oversized_lockfile_is_rejected() {
    let err = read_lockfile(&fixture_path("diamond/package-lock.json"), 16).unwrap_err();
    assert!(matches!(err, AuditError::FileTooBig { max: 16, .. }));
}
