//! 레지스트리 기반 패키지 감사
//!
//! lockfile 없이 패키지 이름(과 선택적 버전)만으로 감사할 때 사용합니다.
//! [`build_registry_graph`]는 [`RegistrySource`]에서 메타데이터를 받아
//! 감사 대상 패키지를 유일한 루트로 하는 [`DependencyGraph`]를 만듭니다.
//!
//! 설치 계획은 세우지 않습니다. 선언된 범위마다 게시된 버전 중 범위를 만족하는
//! 가장 높은 버전 하나를 고를 뿐입니다.
//!
//! [`FsRegistry`]는 npm 레지스트리 문서(packument)를 담은 디렉토리를 읽는
//! 기본 구현입니다.
//!
//! ```text
//! /var/lib/lockaudit/registry/
//!   express.json
//!   @babel/core.json
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AuditError;
use crate::graph::{DependencyGraph, GraphBuilder, NodeId};
use crate::parser::{Ordered, split_npm_alias};
use crate::source::{PackageMetadata, RegistrySource, SourceError, VersionMetadata};
use crate::types::PackageKey;
use crate::vuln::range::{self, NpmRange};

/// 레지스트리 문서 최대 크기 (50 MB)
const MAX_DOCUMENT_SIZE: u64 = 50 * 1024 * 1024;

/// 디렉토리 기반 레지스트리 소스
#[derive(Debug, Clone)]
pub struct FsRegistry {
    root: PathBuf,
}

#[derive(Deserialize)]
struct Packument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    versions: Ordered<PackumentVersion>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackumentVersion {
    dependencies: Ordered<String>,
    optional_dependencies: Ordered<String>,
    dev_dependencies: Ordered<String>,
    deprecated: Option<serde_json::Value>,
    dist: Option<PackumentDist>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct PackumentDist {
    integrity: Option<String>,
}

fn pairs(map: &Ordered<String>) -> Vec<(String, String)> {
    map.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect()
}

impl FsRegistry {
    /// 레지스트리 디렉토리로 소스를 생성합니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 패키지 문서 경로. 디렉토리 밖을 가리키는 이름은 거부합니다.
    fn document_path(&self, name: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && (relative.components().count() == 1
                || (name.starts_with('@') && relative.components().count() == 2));
        if !valid {
            return Err(SourceError::NotFound(format!("invalid package name '{name}'")));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    /// packument JSON을 메타데이터로 변환합니다.
    pub fn parse_document(name: &str, json: &str) -> Result<PackageMetadata, SourceError> {
        let doc: Packument = serde_json::from_str(json)
            .map_err(|e| SourceError::Malformed(format!("{name}: {e}")))?;

        let versions = doc
            .versions
            .iter()
            .map(|(version, meta)| {
                let deprecated = match &meta.deprecated {
                    Some(serde_json::Value::String(msg)) if !msg.is_empty() => Some(msg.clone()),
                    Some(serde_json::Value::Bool(true)) => Some("deprecated".to_owned()),
                    _ => None,
                };
                let metadata = VersionMetadata {
                    version: version.to_owned(),
                    integrity: meta.dist.as_ref().and_then(|d| d.integrity.clone()),
                    dependencies: pairs(&meta.dependencies),
                    optional_dependencies: pairs(&meta.optional_dependencies),
                    dev_dependencies: pairs(&meta.dev_dependencies),
                    deprecated,
                };
                (version.to_owned(), metadata)
            })
            .collect();

        Ok(PackageMetadata {
            name: doc.name.unwrap_or_else(|| name.to_owned()),
            latest: doc.dist_tags.get("latest").cloned(),
            versions,
        })
    }
}

impl RegistrySource for FsRegistry {
    fn fetch_metadata(
        &self,
        name: &str,
        _version: Option<&str>,
    ) -> Result<PackageMetadata, SourceError> {
        let path = self.document_path(name)?;

        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(name.to_owned()));
            }
            Err(e) => return Err(SourceError::Network(format!("{}: {e}", path.display()))),
        };
        if metadata.len() > MAX_DOCUMENT_SIZE {
            return Err(SourceError::Malformed(format!(
                "{}: document size {} bytes exceeds maximum {MAX_DOCUMENT_SIZE} bytes",
                path.display(),
                metadata.len()
            )));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| SourceError::Network(format!("{}: {e}", path.display())))?;
        debug!(package = name, path = %path.display(), "loaded registry document");
        Self::parse_document(name, &content)
    }
}

/// 레지스트리 감사 결과 그래프
#[derive(Debug)]
pub struct RegistryGraph {
    pub graph: DependencyGraph,
    /// 감사 대상의 해석된 버전
    pub version: String,
    /// deprecated 버전, 깊이 제한 등 사용자에게 보일 경고
    pub warnings: Vec<String>,
}

/// 메타데이터 조회 캐시
struct MetadataCache<'a> {
    source: &'a dyn RegistrySource,
    documents: HashMap<String, PackageMetadata>,
}

impl<'a> MetadataCache<'a> {
    fn new(source: &'a dyn RegistrySource) -> Self {
        Self {
            source,
            documents: HashMap::new(),
        }
    }

    fn get(&mut self, name: &str) -> Result<&PackageMetadata, SourceError> {
        if !self.documents.contains_key(name) {
            let doc = self.source.fetch_metadata(name, None)?;
            self.documents.insert(name.to_owned(), doc);
        }
        self.documents
            .get(name)
            .ok_or_else(|| SourceError::NotFound(name.to_owned()))
    }
}

/// 레지스트리 프로토콜이 아닌 의존성 선언 (`file:`, `git+https:`, ...)
fn is_non_registry(spec: &str) -> bool {
    ["file:", "link:", "workspace:", "git+", "git:", "github:", "http:", "https:", "portal:"]
        .iter()
        .any(|prefix| spec.starts_with(prefix))
        || spec.contains('/')
}

/// 선언된 범위에 맞는 게시 버전을 고릅니다.
fn resolve_version(meta: &PackageMetadata, spec: &str) -> Option<String> {
    let spec = spec.trim();
    if spec == "latest" {
        return meta.latest.clone();
    }
    if meta.versions.contains_key(spec) {
        return Some(spec.to_owned());
    }
    let range = NpmRange::parse(spec).ok()?;
    range::max_satisfying(meta.version_strings(), &range).map(str::to_owned)
}

struct Pending {
    id: NodeId,
    name: String,
    version: String,
    depth: usize,
}

/// 패키지 하나를 루트로 하는 의존성 그래프를 만듭니다.
///
/// 루트는 production, optional, development 의존성을 따라가고, 하위 패키지는
/// production과 optional 의존성만 따라갑니다. 루트의 깊이는 0이며
/// `max_depth` 깊이의 노드는 전개하지 않습니다.
///
/// # Errors
///
/// - `PackageNotFound`: 패키지가 없거나 요청한 버전이 게시되지 않음
/// - `UnresolvedDependency`: 필수 의존성의 범위를 만족하는 버전이 없음
/// - `SourceUnavailable`: 소스 조회 실패
pub fn build_registry_graph(
    source: &dyn RegistrySource,
    name: &str,
    version: Option<&str>,
    max_depth: usize,
) -> Result<RegistryGraph, AuditError> {
    let not_found = || AuditError::PackageNotFound {
        name: name.to_owned(),
        version: version.map(str::to_owned),
    };

    let mut cache = MetadataCache::new(source);
    let root_meta = match cache.get(name) {
        Ok(meta) => meta,
        Err(SourceError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let root_version = match version {
        Some(requested) => resolve_version(root_meta, requested),
        None => root_meta.latest.clone(),
    }
    .filter(|v| root_meta.versions.contains_key(v))
    .ok_or_else(not_found)?;

    let mut warnings = Vec::new();
    let root_label = format!("{name}@{root_version}");
    if let Some(msg) = root_meta
        .versions
        .get(&root_version)
        .and_then(|v| v.deprecated.as_deref())
    {
        warn!(package = %root_label, message = msg, "audited version is deprecated");
        warnings.push(format!("{root_label} is deprecated: {msg}"));
    }

    let mut builder = GraphBuilder::new(root_label.clone());
    let integrity = root_meta
        .versions
        .get(&root_version)
        .and_then(|v| v.integrity.clone());
    let root_id = builder.add_node(name, &root_version, integrity.as_deref(), false);
    builder.add_root(root_id);

    let mut queue = VecDeque::from([Pending {
        id: root_id,
        name: name.to_owned(),
        version: root_version.clone(),
        depth: 0,
    }]);
    let mut expanded: HashSet<PackageKey> = HashSet::new();
    let mut truncated = 0usize;

    while let Some(current) = queue.pop_front() {
        if !expanded.insert(PackageKey::new(&current.name, &current.version)) {
            continue;
        }

        let declared = {
            let meta = cache.get(&current.name)?;
            let Some(vmeta) = meta.versions.get(&current.version) else {
                continue;
            };
            declared_dependencies(vmeta, current.depth == 0)
        };
        if declared.is_empty() {
            continue;
        }
        if current.depth >= max_depth {
            truncated += 1;
            debug!(
                package = %PackageKey::new(&current.name, &current.version),
                depth = current.depth,
                "not expanding dependencies beyond maximum depth"
            );
            continue;
        }

        let parent_label = format!("{}@{}", current.name, current.version);
        for dep in declared {
            let (dep_name, spec) =
                split_npm_alias(&dep.spec).unwrap_or((dep.name.as_str(), dep.spec.as_str()));
            if is_non_registry(spec) {
                debug!(dependency = %dep.name, spec, "skipping non-registry dependency");
                continue;
            }

            let resolved = match cache.get(dep_name) {
                Ok(meta) => resolve_version(meta, spec).map(|v| {
                    let integrity = meta.versions.get(&v).and_then(|m| m.integrity.clone());
                    (v, integrity)
                }),
                Err(SourceError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            };

            let Some((child_version, child_integrity)) = resolved else {
                if dep.optional {
                    debug!(dependency = %dep.name, spec, "optional dependency unresolved, skipping");
                    continue;
                }
                return Err(AuditError::unresolved(
                    parent_label,
                    format!("{}@{}", dep.name, dep.spec),
                ));
            };

            let child = builder.add_node(
                dep_name,
                &child_version,
                child_integrity.as_deref(),
                dep.dev,
            );
            builder.add_edge(current.id, child);
            queue.push_back(Pending {
                id: child,
                name: dep_name.to_owned(),
                version: child_version,
                depth: current.depth + 1,
            });
        }
    }

    if truncated > 0 {
        warn!(
            package = %root_label,
            max_depth,
            truncated,
            "dependency expansion truncated at maximum depth"
        );
        warnings.push(format!(
            "dependency tree truncated at depth {max_depth} ({truncated} packages not expanded)"
        ));
    }

    Ok(RegistryGraph {
        graph: builder.build(),
        version: root_version,
        warnings,
    })
}

struct Declared {
    name: String,
    spec: String,
    optional: bool,
    dev: bool,
}

fn declared_dependencies(meta: &VersionMetadata, is_root: bool) -> Vec<Declared> {
    let mut out = Vec::new();
    let mut push = |list: &[(String, String)], optional: bool, dev: bool| {
        for (name, spec) in list {
            out.push(Declared {
                name: name.clone(),
                spec: spec.clone(),
                optional,
                dev,
            });
        }
    };
    push(&meta.dependencies, false, false);
    if is_root {
        push(&meta.dev_dependencies, false, true);
    }
    push(&meta.optional_dependencies, true, false);
    out
}
