//! package-lock.json 파서
//!
//! [`NpmLockParser`]는 npm lockfile을 파싱하여 [`DependencyGraph`]를 생성합니다.
//!
//! - **v2/v3**: 설치 경로로 키가 지정된 `packages` 맵. 루트 항목(`""`)의
//!   의존성 선언이 직접 의존성을 결정합니다.
//! - **v1**: 중첩된 `dependencies` 트리와 `requires`. 루트 매니페스트 정보가 없으므로
//!   다른 패키지가 요구하지 않는 최상위 항목이 직접 의존성이 됩니다.
//!
//! 의존성 이름은 node의 모듈 해석처럼 가장 가까운 `node_modules`부터 위로
//! 올라가며 찾습니다.
//!
//! # package-lock.json v3 형식 예시
//!
//! ```json
//! {
//!   "name": "my-app",
//!   "lockfileVersion": 3,
//!   "packages": {
//!     "": { "name": "my-app", "dependencies": { "lodash": "^4.17.0" } },
//!     "node_modules/lodash": { "version": "4.17.21", "integrity": "sha512-..." }
//!   }
//! }
//! ```

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AuditError;
use crate::graph::{DependencyGraph, GraphBuilder, NodeId};
use crate::parser::{LockfileParser, Ordered, split_npm_alias};
use crate::types::LockfileFormat;

const FORMAT: &str = "npm";

/// 알려진 가장 높은 lockfileVersion
const LATEST_LOCKFILE_VERSION: u32 = 3;

/// package-lock.json 파서
pub struct NpmLockParser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NpmLockFile {
    #[serde(default)]
    lockfile_version: Option<u32>,
    #[serde(default)]
    packages: Option<Ordered<NpmPackageEntry>>,
    #[serde(default)]
    dependencies: Option<Ordered<NpmV1Entry>>,
}

/// v2/v3 `packages` 항목
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NpmPackageEntry {
    name: Option<String>,
    version: Option<String>,
    resolved: Option<String>,
    integrity: Option<String>,
    link: bool,
    dev: bool,
    dependencies: Ordered<String>,
    dev_dependencies: Ordered<String>,
    optional_dependencies: Ordered<String>,
    peer_dependencies: Ordered<String>,
}

impl NpmPackageEntry {
    /// `(name, range, strict)` 선언 순서. optional/peer는 없어도 에러가 아닙니다.
    fn declared(&self, include_dev: bool) -> Vec<(&str, &str, bool)> {
        let mut out: Vec<(&str, &str, bool)> = Vec::new();
        out.extend(self.dependencies.iter().map(|(n, r)| (n, r.as_str(), true)));
        if include_dev {
            out.extend(self.dev_dependencies.iter().map(|(n, r)| (n, r.as_str(), true)));
        }
        out.extend(self.optional_dependencies.iter().map(|(n, r)| (n, r.as_str(), false)));
        out.extend(self.peer_dependencies.iter().map(|(n, r)| (n, r.as_str(), false)));
        out
    }
}

/// v1 `dependencies` 트리 항목
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NpmV1Entry {
    version: Option<String>,
    integrity: Option<String>,
    dev: bool,
    requires: Ordered<String>,
    dependencies: Ordered<NpmV1Entry>,
}

impl LockfileParser for NpmLockParser {
    fn format(&self) -> LockfileFormat {
        LockfileFormat::Npm
    }

    fn parse(&self, content: &str, source: &str) -> Result<DependencyGraph, AuditError> {
        let lock: NpmLockFile = serde_json::from_str(content).map_err(|e| {
            AuditError::parse(
                FORMAT,
                format!("line {}, column {}", e.line(), e.column()),
                e.to_string(),
            )
        })?;

        if let Some(version) = lock.lockfile_version
            && version > LATEST_LOCKFILE_VERSION
        {
            warn!(source, lockfile_version = version, "unknown lockfileVersion, parsing as v3");
        }

        match (&lock.packages, &lock.dependencies) {
            (Some(packages), _) => parse_packages(packages, source),
            (None, Some(dependencies)) => parse_v1(dependencies, source),
            (None, None) if lock.lockfile_version.is_some() => Ok(GraphBuilder::new(source).build()),
            (None, None) => Err(AuditError::parse(
                FORMAT,
                "document root",
                "missing `lockfileVersion`, `packages` and `dependencies`",
            )),
        }
    }
}

/// 설치 경로의 내용
enum Slot {
    Node(NodeId),
    /// 링크 대상 경로
    Link(String),
}

/// 설치 경로 -> 노드 맵
#[derive(Default)]
struct InstallTree {
    slots: HashMap<String, Slot>,
}

impl InstallTree {
    fn insert_node(&mut self, path: &str, id: NodeId) {
        self.slots.insert(path.to_owned(), Slot::Node(id));
    }

    fn node_at(&self, path: &str) -> Option<NodeId> {
        match self.slots.get(path)? {
            Slot::Node(id) => Some(*id),
            Slot::Link(target) => match self.slots.get(target)? {
                Slot::Node(id) => Some(*id),
                Slot::Link(_) => None,
            },
        }
    }

    /// `from`에 설치된 패키지가 `require(name)`으로 얻는 노드
    fn resolve(&self, from: &str, name: &str) -> Option<NodeId> {
        let mut prefix = from;
        loop {
            let candidate = if prefix.is_empty() {
                format!("node_modules/{name}")
            } else {
                format!("{prefix}/node_modules/{name}")
            };
            if self.slots.contains_key(&candidate) {
                return self.node_at(&candidate);
            }
            if prefix.is_empty() {
                return None;
            }
            prefix = parent_path(prefix);
        }
    }
}

/// 한 단계 위의 설치 경로 (`a/node_modules/b` -> `a`, `node_modules/a` -> ``)
fn parent_path(path: &str) -> &str {
    match path.rfind("/node_modules/") {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// `node_modules/@scope/name` 또는 `node_modules/name`에서 패키지명 추출
fn name_from_path(path: &str) -> &str {
    match path.rfind("node_modules/") {
        Some(pos) => &path[pos + "node_modules/".len()..],
        None => path.rsplit('/').next().unwrap_or(path),
    }
}

fn entry_location(section: &str, path: &str) -> String {
    format!("{section}[\"{path}\"]")
}

fn parse_packages(
    packages: &Ordered<NpmPackageEntry>,
    source: &str,
) -> Result<DependencyGraph, AuditError> {
    let mut builder = GraphBuilder::new(source);
    let mut tree = InstallTree::default();

    for (path, entry) in packages.iter() {
        if path.is_empty() {
            continue;
        }
        if entry.link {
            let target = entry.resolved.as_ref().ok_or_else(|| {
                AuditError::parse(
                    FORMAT,
                    entry_location("packages", path),
                    "link entry without `resolved` target",
                )
            })?;
            tree.slots.insert(path.to_owned(), Slot::Link(target.clone()));
            continue;
        }

        let version = entry.version.as_deref().ok_or_else(|| {
            AuditError::parse(FORMAT, entry_location("packages", path), "missing `version`")
        })?;
        let name = entry.name.as_deref().unwrap_or_else(|| name_from_path(path));
        let id = builder.add_node(name, version, entry.integrity.as_deref(), entry.dev);
        tree.insert_node(path, id);
    }

    for (path, entry) in packages.iter() {
        if path.is_empty() || entry.link {
            continue;
        }
        let Some(parent) = tree.node_at(path) else {
            continue;
        };
        for (dep, range, strict) in entry.declared(false) {
            match tree.resolve(path, dep) {
                Some(child) => builder.add_edge(parent, child),
                None if strict => {
                    let package = builder
                        .key_of(parent)
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| path.to_owned());
                    return Err(AuditError::unresolved(package, format!("{dep}@{range}")));
                }
                None => debug!(package = path, dependency = dep, "optional dependency not installed"),
            }
        }
    }

    match packages.get("") {
        Some(root) => {
            for (dep, range, strict) in root.declared(true) {
                match tree.resolve("", dep) {
                    Some(id) => builder.add_root(id),
                    None if strict => {
                        return Err(AuditError::unresolved("<root>", format!("{dep}@{range}")));
                    }
                    None => debug!(dependency = dep, "optional root dependency not installed"),
                }
            }
        }
        None => {
            debug!(source, "no root package entry, using packages without dependents as roots");
            for id in builder.nodes_without_parents() {
                builder.add_root(id);
            }
            builder.promote_unreached_to_roots();
        }
    }

    Ok(builder.build())
}

fn parse_v1(dependencies: &Ordered<NpmV1Entry>, source: &str) -> Result<DependencyGraph, AuditError> {
    let mut builder = GraphBuilder::new(source);
    let mut tree = InstallTree::default();
    let mut installed = Vec::new();

    collect_v1(dependencies, "", &mut builder, &mut tree, &mut installed)?;

    for (path, entry) in &installed {
        let Some(parent) = tree.node_at(path) else {
            continue;
        };
        for (dep, range) in entry.requires.iter() {
            let child = tree.resolve(path, dep).ok_or_else(|| {
                let package = builder
                    .key_of(parent)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| path.clone());
                AuditError::unresolved(package, format!("{dep}@{range}"))
            })?;
            builder.add_edge(parent, child);
        }
    }

    let parentless: HashSet<NodeId> = builder.nodes_without_parents().into_iter().collect();
    for (name, _) in dependencies.iter() {
        if let Some(id) = tree.node_at(&format!("node_modules/{name}"))
            && parentless.contains(&id)
        {
            builder.add_root(id);
        }
    }
    let promoted = builder.promote_unreached_to_roots();
    if promoted > 0 {
        debug!(source, promoted, "promoted cyclic packages to roots");
    }

    Ok(builder.build())
}

fn collect_v1<'a>(
    entries: &'a Ordered<NpmV1Entry>,
    prefix: &str,
    builder: &mut GraphBuilder,
    tree: &mut InstallTree,
    installed: &mut Vec<(String, &'a NpmV1Entry)>,
) -> Result<(), AuditError> {
    for (dir_name, entry) in entries.iter() {
        let path = if prefix.is_empty() {
            format!("node_modules/{dir_name}")
        } else {
            format!("{prefix}/node_modules/{dir_name}")
        };

        let raw_version = entry.version.as_deref().ok_or_else(|| {
            AuditError::parse(FORMAT, entry_location("dependencies", &path), "missing `version`")
        })?;
        let (name, version) = split_npm_alias(raw_version).unwrap_or((dir_name, raw_version));

        let id = builder.add_node(name, version, entry.integrity.as_deref(), entry.dev);
        tree.insert_node(&path, id);
        installed.push((path.clone(), entry));

        collect_v1(&entry.dependencies, &path, builder, tree, installed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<DependencyGraph, AuditError> {
        NpmLockParser.parse(content, "package-lock.json")
    }

    fn root_names(graph: &DependencyGraph) -> Vec<String> {
        graph
            .roots()
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|n| n.key().to_string())
            .collect()
    }

    const V3: &str = r#"{
      "name": "app",
      "lockfileVersion": 3,
      "packages": {
        "": {
          "name": "app",
          "dependencies": { "express": "^4.18.0", "lodash": "^4.17.0" },
          "devDependencies": { "jest": "^29.0.0" }
        },
        "node_modules/express": {
          "version": "4.18.2",
          "integrity": "sha512-express",
          "dependencies": { "debug": "2.6.9", "ms": "^2.0.0" }
        },
        "node_modules/debug": {
          "version": "2.6.9",
          "dependencies": { "ms": "2.0.0" }
        },
        "node_modules/debug/node_modules/ms": { "version": "2.0.0" },
        "node_modules/ms": { "version": "2.1.3" },
        "node_modules/lodash": { "version": "4.17.20" },
        "node_modules/jest": { "version": "29.7.0", "dev": true, "dependencies": { "ms": "^2.1.0" } },
        "node_modules/stale": { "version": "0.0.1", "extraneous": true }
      }
    }"#;

    #[test]
    fn v3_roots_follow_root_manifest() {
        let graph = parse(V3).unwrap();
        assert_eq!(
            root_names(&graph),
            vec!["express@4.18.2", "lodash@4.17.20", "jest@29.7.0"]
        );
        let express = graph.node(graph.lookup("express", "4.18.2").unwrap()).unwrap();
        assert!(express.is_direct);
        assert_eq!(express.integrity.as_deref(), Some("sha512-express"));
    }

    #[test]
    fn v3_nested_install_shadows_hoisted_copy() {
        let graph = parse(V3).unwrap();
        let debug = graph.node(graph.lookup("debug", "2.6.9").unwrap()).unwrap();
        let child = graph.node(debug.children[0]).unwrap();
        assert_eq!(child.version, "2.0.0");

        let express = graph.node(graph.lookup("express", "4.18.2").unwrap()).unwrap();
        let hoisted = graph.node(express.children[1]).unwrap();
        assert_eq!(hoisted.key().to_string(), "ms@2.1.3");
    }

    #[test]
    fn v3_same_name_two_versions_are_distinct_nodes() {
        let graph = parse(V3).unwrap();
        assert!(graph.lookup("ms", "2.0.0").is_some());
        assert!(graph.lookup("ms", "2.1.3").is_some());
    }

    #[test]
    fn v3_unreachable_entries_are_dropped() {
        let graph = parse(V3).unwrap();
        assert!(graph.lookup("stale", "0.0.1").is_none());
        assert_eq!(graph.len(), 6);
    }

    #[test]
    fn v3_dev_flag_is_carried() {
        let graph = parse(V3).unwrap();
        let jest = graph.node(graph.lookup("jest", "29.7.0").unwrap()).unwrap();
        assert!(jest.dev);
        let ms = graph.node(graph.lookup("ms", "2.1.3").unwrap()).unwrap();
        assert!(!ms.dev);
    }

    #[test]
    fn v3_missing_version_names_entry() {
        let content = r#"{"lockfileVersion": 3, "packages": {
            "": {"dependencies": {"a": "1"}},
            "node_modules/a": {"resolved": "https://example.invalid/a.tgz"}
        }}"#;
        match parse(content) {
            Err(AuditError::LockfileParse { location, reason, .. }) => {
                assert_eq!(location, "packages[\"node_modules/a\"]");
                assert!(reason.contains("version"));
            }
            other => panic!("expected LockfileParse, got {other:?}"),
        }
    }

    #[test]
    fn v3_missing_dependency_is_unresolved() {
        let content = r#"{"lockfileVersion": 3, "packages": {
            "": {"dependencies": {"a": "^1.0.0"}},
            "node_modules/a": {"version": "1.0.0", "dependencies": {"gone": "^2.0.0"}}
        }}"#;
        match parse(content) {
            Err(AuditError::UnresolvedDependency { package, dependency }) => {
                assert_eq!(package, "a@1.0.0");
                assert_eq!(dependency, "gone@^2.0.0");
            }
            other => panic!("expected UnresolvedDependency, got {other:?}"),
        }
    }

    #[test]
    fn v3_missing_optional_dependency_is_skipped() {
        let content = r#"{"lockfileVersion": 3, "packages": {
            "": {"dependencies": {"a": "^1.0.0"}, "optionalDependencies": {"fsevents": "^2.0.0"}},
            "node_modules/a": {"version": "1.0.0", "peerDependencies": {"react": "*"}}
        }}"#;
        let graph = parse(content).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn v3_alias_uses_real_name() {
        let content = r#"{"lockfileVersion": 3, "packages": {
            "": {"dependencies": {"string-width-cjs": "npm:string-width@^4.2.0"}},
            "node_modules/string-width-cjs": {"name": "string-width", "version": "4.2.3"}
        }}"#;
        let graph = parse(content).unwrap();
        assert!(graph.lookup("string-width", "4.2.3").is_some());
    }

    #[test]
    fn v3_links_resolve_to_workspace_target() {
        let content = r#"{"lockfileVersion": 3, "packages": {
            "": {"dependencies": {"@app/util": "*"}},
            "node_modules/@app/util": {"resolved": "packages/util", "link": true},
            "packages/util": {"name": "@app/util", "version": "0.1.0", "dependencies": {"ms": "^2.1.0"}},
            "node_modules/ms": {"version": "2.1.3"}
        }}"#;
        let graph = parse(content).unwrap();
        let util = graph.lookup("@app/util", "0.1.0").unwrap();
        assert_eq!(graph.roots(), &[util]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn v3_scoped_names_from_path() {
        assert_eq!(name_from_path("node_modules/@babel/core"), "@babel/core");
        assert_eq!(name_from_path("node_modules/a/node_modules/@s/b"), "@s/b");
        assert_eq!(parent_path("node_modules/@s/a/node_modules/b"), "node_modules/@s/a");
        assert_eq!(parent_path("node_modules/a"), "");
    }

    #[test]
    fn syntax_error_reports_line() {
        let err = parse("{\n  \"lockfileVersion\": 3,\n  \"packages\": [\n").unwrap_err();
        match err {
            AuditError::LockfileParse { format, location, .. } => {
                assert_eq!(format, "npm");
                assert!(location.starts_with("line 3"), "{location}");
            }
            other => panic!("expected LockfileParse, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_document_is_error() {
        assert!(matches!(
            parse(r#"{"name": "x"}"#),
            Err(AuditError::LockfileParse { .. })
        ));
        assert!(parse(r#"{"lockfileVersion": 2}"#).unwrap().is_empty());
    }

    const V1: &str = r#"{
      "name": "app",
      "lockfileVersion": 1,
      "requires": true,
      "dependencies": {
        "a": { "version": "1.0.0", "requires": { "c": "^1.0.0" } },
        "b": {
          "version": "1.0.0",
          "requires": { "c": "^1.0.0", "d": "^2.0.0" },
          "dependencies": { "d": { "version": "2.0.0", "dev": true } }
        },
        "c": { "version": "1.0.0", "integrity": "sha1-c" },
        "d": { "version": "1.0.0" },
        "alias": { "version": "npm:real@3.0.0" }
      }
    }"#;

    #[test]
    fn v1_roots_are_unrequired_top_level_entries() {
        let graph = parse(V1).unwrap();
        assert_eq!(
            root_names(&graph),
            vec!["a@1.0.0", "b@1.0.0", "d@1.0.0", "real@3.0.0"]
        );
    }

    #[test]
    fn v1_nested_requires_resolve_nearest() {
        let graph = parse(V1).unwrap();
        let b = graph.node(graph.lookup("b", "1.0.0").unwrap()).unwrap();
        let children: Vec<_> = b
            .children
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|n| n.key().to_string())
            .collect();
        assert_eq!(children, vec!["c@1.0.0", "d@2.0.0"]);
        assert!(graph.node(graph.lookup("d", "2.0.0").unwrap()).unwrap().dev);
    }

    #[test]
    fn v1_diamond_shares_one_node() {
        let graph = parse(V1).unwrap();
        let c = graph.lookup("c", "1.0.0").unwrap();
        let parents = graph
            .all_nodes()
            .filter(|(_, n)| n.children.contains(&c))
            .count();
        assert_eq!(parents, 2);
    }

    #[test]
    fn v1_cycle_is_promoted() {
        let content = r#"{"lockfileVersion": 1, "dependencies": {
            "x": {"version": "1.0.0", "requires": {"y": "1.0.0"}},
            "y": {"version": "1.0.0", "requires": {"x": "1.0.0"}}
        }}"#;
        let graph = parse(content).unwrap();
        assert_eq!(root_names(&graph), vec!["x@1.0.0"]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn v1_missing_require_is_unresolved() {
        let content = r#"{"lockfileVersion": 1, "dependencies": {
            "x": {"version": "1.0.0", "requires": {"nope": "^1.0.0"}}
        }}"#;
        assert!(matches!(
            parse(content),
            Err(AuditError::UnresolvedDependency { .. })
        ));
    }
}
