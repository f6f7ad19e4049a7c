//! pnpm-lock.yaml 파서
//!
//! [`PnpmLockParser`]는 pnpm lockfile v5, v6, v9를 파싱합니다.
//!
//! | lockfileVersion | 패키지 키 | 간선 출처 |
//! |---|---|---|
//! | 5.x | `/name/1.0.0_peer@1.0.0` | `packages` |
//! | 6.x | `/name@1.0.0(peer@1.0.0)` | `packages` |
//! | 9.x | `name@1.0.0` | `snapshots` |
//!
//! 직접 의존성은 `importers["."]`에서, 단일 프로젝트 문서라면 최상위
//! `dependencies`/`devDependencies`/`optionalDependencies`에서 가져옵니다.
//! peer 접미사가 다른 변형은 하나의 `(name, version)` 노드로 합쳐집니다.

use serde::Deserialize;
use tracing::debug;

use crate::error::AuditError;
use crate::graph::{DependencyGraph, GraphBuilder, NodeId};
use crate::parser::{LockfileParser, Ordered, Scalar, split_name_at};
use crate::types::LockfileFormat;

const FORMAT: &str = "pnpm";

/// pnpm-lock.yaml 파서
pub struct PnpmLockParser;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmLockFile {
    lockfile_version: Option<Scalar>,
    importers: Option<Ordered<PnpmImporter>>,
    dependencies: Option<Ordered<ImporterDependency>>,
    dev_dependencies: Option<Ordered<ImporterDependency>>,
    optional_dependencies: Option<Ordered<ImporterDependency>>,
    packages: Option<Ordered<PnpmPackage>>,
    snapshots: Option<Ordered<PnpmSnapshot>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmImporter {
    dependencies: Option<Ordered<ImporterDependency>>,
    dev_dependencies: Option<Ordered<ImporterDependency>>,
    optional_dependencies: Option<Ordered<ImporterDependency>>,
}

impl PnpmImporter {
    /// `(name, version, strict)` 선언 순서
    fn declared(&self) -> Vec<(&str, &str, bool)> {
        let mut out = Vec::new();
        let sections = [
            (&self.dependencies, true),
            (&self.dev_dependencies, true),
            (&self.optional_dependencies, false),
        ];
        for (section, strict) in sections {
            for (name, dep) in section.iter().flat_map(Ordered::iter) {
                out.push((name, dep.version(), strict));
            }
        }
        out
    }
}

/// v5: `lodash: 4.17.20`, v6+: `lodash: {specifier: ^4.17.0, version: 4.17.20}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImporterDependency {
    Plain(Scalar),
    Detailed { version: Scalar },
}

impl ImporterDependency {
    fn version(&self) -> &str {
        match self {
            Self::Plain(version) | Self::Detailed { version } => version.as_str(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmPackage {
    name: Option<String>,
    version: Option<Scalar>,
    resolution: Option<PnpmResolution>,
    dev: Option<bool>,
    dependencies: Option<Ordered<Scalar>>,
    optional_dependencies: Option<Ordered<Scalar>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmResolution {
    integrity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmSnapshot {
    dependencies: Option<Ordered<Scalar>>,
    optional_dependencies: Option<Ordered<Scalar>>,
}

/// `(name, version, strict)` 선언 순서
fn resolved_edges<'a>(
    dependencies: &'a Option<Ordered<Scalar>>,
    optional: &'a Option<Ordered<Scalar>>,
) -> Vec<(&'a str, &'a str, bool)> {
    let mut out = Vec::new();
    for (name, version) in dependencies.iter().flat_map(Ordered::iter) {
        out.push((name, version.as_str(), true));
    }
    for (name, version) in optional.iter().flat_map(Ordered::iter) {
        out.push((name, version.as_str(), false));
    }
    out
}

/// 패키지 키 문법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyStyle {
    /// v5: `/name/version`
    Slash,
    /// v6+: `/name@version`, `name@version`
    At,
}

fn lockfile_major(raw: &str) -> Option<u32> {
    raw.trim().split('.').next()?.parse().ok()
}

fn is_local(reference: &str) -> bool {
    reference.starts_with("link:") || reference.starts_with("file:")
}

/// peer 접미사를 제거합니다 (`1.0.0(react@18.0.0)`, v5 `1.0.0_react@18.0.0`).
fn strip_peer_suffix(version: &str, style: KeyStyle) -> &str {
    let cut = match style {
        KeyStyle::Slash => version.find(['(', '_']),
        KeyStyle::At => version.find('('),
    };
    cut.map_or(version, |pos| &version[..pos])
}

/// 패키지 키를 `(name, version)`으로 풉니다.
fn parse_package_key(key: &str, style: KeyStyle) -> Option<(&str, &str)> {
    let key = key.split('(').next().unwrap_or(key);
    match style {
        KeyStyle::Slash => {
            let (name, version) = key.trim_start_matches('/').rsplit_once('/')?;
            let version = strip_peer_suffix(version, style);
            (!name.is_empty() && !version.is_empty()).then_some((name, version))
        }
        KeyStyle::At => {
            let (name, version) = split_name_at(key.trim_start_matches('/'))?;
            (!name.is_empty() && !version.is_empty()).then_some((name, version))
        }
    }
}

/// 의존성 참조를 `(name, version)`으로 풉니다. 로컬 참조는 `None`입니다.
fn parse_reference<'a>(name: &'a str, reference: &'a str, style: KeyStyle) -> Option<(&'a str, &'a str)> {
    if is_local(reference) {
        return None;
    }
    if reference.starts_with('/') {
        return parse_package_key(reference, style);
    }
    let plain = reference.split('(').next().unwrap_or(reference);
    if style == KeyStyle::At
        && let Some((alias_target, version)) = split_name_at(plain)
    {
        return Some((alias_target, version));
    }
    Some((name, strip_peer_suffix(reference, style)))
}

fn yaml_location(err: &serde_yaml::Error) -> String {
    err.location()
        .map(|loc| format!("line {}, column {}", loc.line(), loc.column()))
        .unwrap_or_else(|| "document".to_owned())
}

fn entry_location(section: &str, key: &str) -> String {
    format!("{section}[\"{key}\"]")
}

impl LockfileParser for PnpmLockParser {
    fn format(&self) -> LockfileFormat {
        LockfileFormat::Pnpm
    }

    fn parse(&self, content: &str, source: &str) -> Result<DependencyGraph, AuditError> {
        let lock: PnpmLockFile = serde_yaml::from_str(content)
            .map_err(|e| AuditError::parse(FORMAT, yaml_location(&e), e.to_string()))?;

        let raw_version = lock.lockfile_version.as_ref().ok_or_else(|| {
            AuditError::parse(FORMAT, "lockfileVersion", "missing `lockfileVersion`")
        })?;
        let major = lockfile_major(raw_version.as_str()).ok_or_else(|| {
            AuditError::parse(
                FORMAT,
                "lockfileVersion",
                format!("unrecognized lockfileVersion `{}`", raw_version.as_str()),
            )
        })?;
        let style = if major < 6 { KeyStyle::Slash } else { KeyStyle::At };

        let mut builder = GraphBuilder::new(source);
        let mut package_ids: Vec<Option<NodeId>> = Vec::new();

        for (key, pkg) in lock.packages.iter().flat_map(Ordered::iter) {
            if is_local(key) {
                debug!(package = key, "skipping local package entry");
                package_ids.push(None);
                continue;
            }
            let (name, version) = match (&pkg.name, &pkg.version) {
                (Some(name), Some(version)) => (name.as_str(), version.as_str()),
                _ => parse_package_key(key, style).ok_or_else(|| {
                    AuditError::parse(
                        FORMAT,
                        entry_location("packages", key),
                        "package key is not `name@version`",
                    )
                })?,
            };
            let integrity = pkg.resolution.as_ref().and_then(|r| r.integrity.as_deref());
            let id = builder.add_node(name, version, integrity, pkg.dev.unwrap_or(false));
            package_ids.push(Some(id));
        }

        let mut edge_sources: Vec<(String, NodeId, Vec<(&str, &str, bool)>)> = Vec::new();
        if major >= 9 {
            for (key, snapshot) in lock.snapshots.iter().flat_map(Ordered::iter) {
                if is_local(key) {
                    continue;
                }
                let parent = parse_package_key(key, style)
                    .and_then(|(name, version)| builder.lookup(name, version))
                    .ok_or_else(|| {
                        AuditError::parse(
                            FORMAT,
                            entry_location("snapshots", key),
                            "snapshot has no matching `packages` entry",
                        )
                    })?;
                edge_sources.push((
                    key.to_owned(),
                    parent,
                    resolved_edges(&snapshot.dependencies, &snapshot.optional_dependencies),
                ));
            }
        } else {
            for ((key, pkg), id) in lock.packages.iter().flat_map(Ordered::iter).zip(&package_ids) {
                if let Some(parent) = *id {
                    edge_sources.push((
                        key.to_owned(),
                        parent,
                        resolved_edges(&pkg.dependencies, &pkg.optional_dependencies),
                    ));
                }
            }
        }

        for (key, parent, edges) in edge_sources {
            for (dep, reference, strict) in edges {
                let Some((name, version)) = parse_reference(dep, reference, style) else {
                    continue;
                };
                match builder.lookup(name, version) {
                    Some(child) => builder.add_edge(parent, child),
                    None if strict => {
                        let package = builder
                            .key_of(parent)
                            .map(|k| k.to_string())
                            .unwrap_or_else(|| key.clone());
                        return Err(AuditError::unresolved(package, format!("{dep}@{reference}")));
                    }
                    None => debug!(package = %key, dependency = dep, "optional dependency not locked"),
                }
            }
        }

        let top_level;
        let root = match &lock.importers {
            Some(importers) => importers.get(".").ok_or_else(|| {
                AuditError::parse(FORMAT, "importers", "no root project `.`")
            })?,
            None => {
                top_level = PnpmImporter {
                    dependencies: lock.dependencies,
                    dev_dependencies: lock.dev_dependencies,
                    optional_dependencies: lock.optional_dependencies,
                };
                &top_level
            }
        };

        for (dep, reference, strict) in root.declared() {
            let Some((name, version)) = parse_reference(dep, reference, style) else {
                debug!(dependency = dep, reference, "skipping local root dependency");
                continue;
            };
            match builder.lookup(name, version) {
                Some(id) => builder.add_root(id),
                None if strict => {
                    return Err(AuditError::unresolved("<root>", format!("{dep}@{reference}")));
                }
                None => debug!(dependency = dep, "optional root dependency not locked"),
            }
        }

        Ok(builder.build())
    }
}
