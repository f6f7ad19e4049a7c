//! yarn.lock 파서
//!
//! [`YarnLockParser`]는 두 가지 yarn lockfile을 처리합니다.
//!
//! - **classic (v1)**: 들여쓰기 기반 자체 문법. 여러 selector가 하나의 해석 결과를
//!   공유하면 하나의 노드가 됩니다. 루트 매니페스트 정보가 없으므로 다른 패키지가
//!   참조하지 않는 패키지가 직접 의존성입니다.
//! - **berry (v2+)**: `__metadata`가 있는 YAML. `@workspace:.` 항목의 의존성이
//!   직접 의존성입니다.
//!
//! # classic 형식 예시
//!
//! ```text
//! "@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
//!   version "7.12.13"
//!   integrity sha512-...
//!   dependencies:
//!     "@babel/highlight" "^7.12.13"
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::AuditError;
use crate::graph::{DependencyGraph, GraphBuilder, NodeId};
use crate::parser::{LockfileParser, Ordered, Scalar, split_name_at, split_npm_alias};
use crate::types::LockfileFormat;

const FORMAT: &str = "yarn";

/// yarn.lock 파서
pub struct YarnLockParser;

impl LockfileParser for YarnLockParser {
    fn format(&self) -> LockfileFormat {
        LockfileFormat::Yarn
    }

    fn parse(&self, content: &str, source: &str) -> Result<DependencyGraph, AuditError> {
        if is_berry(content) {
            parse_berry(content, source)
        } else {
            parse_classic(content, source)
        }
    }
}

fn is_berry(content: &str) -> bool {
    content.lines().any(|line| line.starts_with("__metadata:"))
}

fn line_location(line_no: usize) -> String {
    format!("line {line_no}")
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// `key value` 또는 `"key" "value"` 한 줄을 나눕니다.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let (key, rest) = if let Some(quoted) = line.strip_prefix('"') {
        let end = quoted.find('"')?;
        (&quoted[..end], &quoted[end + 1..])
    } else {
        let end = line.find(char::is_whitespace).unwrap_or(line.len());
        (&line[..end], &line[end..])
    };
    Some((key, unquote(rest)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepKind {
    Required,
    Optional,
}

/// 들여쓰기 2칸 필드가 연 하위 섹션
#[derive(Debug, Clone, Copy)]
enum Section {
    Dependencies(DepKind),
    /// 알 수 없는 필드의 하위 항목은 건너뜁니다.
    Ignored,
}

/// classic 블록 하나
#[derive(Debug, Default)]
struct ClassicBlock {
    line: usize,
    name: String,
    version: Option<String>,
    integrity: Option<String>,
    /// `(name, range, kind)`
    dependencies: Vec<(String, String, DepKind)>,
}

fn parse_classic(content: &str, source: &str) -> Result<DependencyGraph, AuditError> {
    let mut blocks: Vec<ClassicBlock> = Vec::new();
    let mut selectors: HashMap<String, usize> = HashMap::new();
    let mut section: Option<Section> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start_matches(' ').len();
        if line[indent..].starts_with('\t') {
            return Err(AuditError::parse(FORMAT, line_location(line_no), "tab indentation"));
        }

        match indent {
            0 => {
                let header = line.strip_suffix(':').ok_or_else(|| {
                    AuditError::parse(FORMAT, line_location(line_no), "expected `selector:` header")
                })?;
                let block_idx = blocks.len();
                let mut name = None;
                for selector in header.split(',').map(unquote).filter(|s| !s.is_empty()) {
                    let (sel_name, range) = split_name_at(selector).ok_or_else(|| {
                        AuditError::parse(
                            FORMAT,
                            line_location(line_no),
                            format!("selector `{selector}` has no version range"),
                        )
                    })?;
                    let real_name = split_npm_alias(range).map_or(sel_name, |(real, _)| real);
                    name.get_or_insert_with(|| real_name.to_owned());
                    if selectors.insert(selector.to_owned(), block_idx).is_some() {
                        return Err(AuditError::parse(
                            FORMAT,
                            line_location(line_no),
                            format!("duplicate selector `{selector}`"),
                        ));
                    }
                }
                let name = name.ok_or_else(|| {
                    AuditError::parse(FORMAT, line_location(line_no), "empty selector list")
                })?;
                blocks.push(ClassicBlock {
                    line: line_no,
                    name,
                    ..ClassicBlock::default()
                });
                section = None;
            }
            2 => {
                let block = blocks.last_mut().ok_or_else(|| {
                    AuditError::parse(FORMAT, line_location(line_no), "field outside of a package block")
                })?;
                let field = line.trim();
                section = match field {
                    "dependencies:" => Some(Section::Dependencies(DepKind::Required)),
                    "optionalDependencies:" => Some(Section::Dependencies(DepKind::Optional)),
                    _ if field.ends_with(':') => {
                        debug!(line = line_no, field, "skipping unknown section");
                        Some(Section::Ignored)
                    }
                    _ => {
                        if let Some((key, value)) = split_key_value(field) {
                            match key {
                                "version" => block.version = Some(value.to_owned()),
                                "integrity" => block.integrity = Some(value.to_owned()),
                                _ => {}
                            }
                        }
                        None
                    }
                };
            }
            4 => {
                let (block, kind) = match (blocks.last_mut(), section) {
                    (Some(_), Some(Section::Ignored)) => continue,
                    (Some(block), Some(Section::Dependencies(kind))) => (block, kind),
                    _ => {
                        return Err(AuditError::parse(
                            FORMAT,
                            line_location(line_no),
                            "dependency entry outside of a dependencies section",
                        ));
                    }
                };
                let (dep, range) = split_key_value(line).ok_or_else(|| {
                    AuditError::parse(FORMAT, line_location(line_no), "malformed dependency entry")
                })?;
                block
                    .dependencies
                    .push((dep.to_owned(), range.to_owned(), kind));
            }
            _ => {
                return Err(AuditError::parse(
                    FORMAT,
                    line_location(line_no),
                    format!("unexpected indentation of {indent} spaces"),
                ));
            }
        }
    }

    let mut builder = GraphBuilder::new(source);
    let mut ids = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let version = block.version.as_deref().ok_or_else(|| {
            AuditError::parse(FORMAT, line_location(block.line), "package block without `version`")
        })?;
        ids.push(builder.add_node(&block.name, version, block.integrity.as_deref(), false));
    }

    for (block, &parent) in blocks.iter().zip(&ids) {
        for (dep, range, kind) in &block.dependencies {
            let selector = format!("{dep}@{range}");
            match selectors.get(&selector) {
                Some(&child) => builder.add_edge(parent, ids[child]),
                None if *kind == DepKind::Required => {
                    return Err(AuditError::unresolved(
                        format!("{}@{}", block.name, block.version.as_deref().unwrap_or_default()),
                        selector,
                    ));
                }
                None => debug!(dependency = %selector, "optional dependency not locked"),
            }
        }
    }

    promote_roots(&mut builder, source);
    Ok(builder.build())
}

/// 매니페스트 정보가 없을 때 부모 없는 노드와 순환 컴포넌트를 루트로 삼습니다.
fn promote_roots(builder: &mut GraphBuilder, source: &str) {
    for id in builder.nodes_without_parents() {
        builder.add_root(id);
    }
    let promoted = builder.promote_unreached_to_roots();
    if promoted > 0 {
        debug!(source, promoted, "promoted cyclic packages to roots");
    }
}

/// berry 항목
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BerryEntry {
    version: Option<Scalar>,
    resolution: Option<String>,
    checksum: Option<String>,
    dependencies: Option<Ordered<Scalar>>,
    optional_dependencies: Option<Ordered<Scalar>>,
    peer_dependencies: Option<Ordered<Scalar>>,
    dependencies_meta: Option<Ordered<BerryDependencyMeta>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BerryDependencyMeta {
    optional: bool,
}

impl BerryEntry {
    fn is_optional(&self, dep: &str) -> bool {
        self.dependencies_meta
            .as_ref()
            .and_then(|meta| meta.get(dep))
            .is_some_and(|m| m.optional)
    }

    /// `(name, range, required)` 선언 순서
    fn declared(&self) -> Vec<(&str, &str, bool)> {
        let mut out = Vec::new();
        for (dep, range) in self.dependencies.iter().flat_map(Ordered::iter) {
            out.push((dep, range.as_str(), !self.is_optional(dep)));
        }
        for (dep, range) in self.optional_dependencies.iter().flat_map(Ordered::iter) {
            out.push((dep, range.as_str(), false));
        }
        for (dep, range) in self.peer_dependencies.iter().flat_map(Ordered::iter) {
            out.push((dep, range.as_str(), false));
        }
        out
    }
}

fn yaml_location(err: &serde_yaml::Error) -> String {
    err.location()
        .map(|loc| format!("line {}, column {}", loc.line(), loc.column()))
        .unwrap_or_else(|| "document".to_owned())
}

fn parse_berry(content: &str, source: &str) -> Result<DependencyGraph, AuditError> {
    let document: Ordered<serde_yaml::Value> = serde_yaml::from_str(content)
        .map_err(|e| AuditError::parse(FORMAT, yaml_location(&e), e.to_string()))?;

    let mut entries: Vec<(&str, BerryEntry)> = Vec::new();
    for (key, value) in document.iter() {
        if key == "__metadata" {
            continue;
        }
        let entry: BerryEntry = serde_yaml::from_value(value.clone())
            .map_err(|e| AuditError::parse(FORMAT, format!("\"{key}\""), e.to_string()))?;
        entries.push((key, entry));
    }

    let mut builder = GraphBuilder::new(source);
    let mut selectors: HashMap<String, NodeId> = HashMap::new();
    let mut ids = Vec::with_capacity(entries.len());
    let mut root_workspace = None;

    for (idx, (key, entry)) in entries.iter().enumerate() {
        let resolution = entry.resolution.as_deref().unwrap_or(key);
        if resolution.ends_with("@workspace:.") {
            root_workspace = Some(idx);
            ids.push(None);
            continue;
        }

        let version = entry.version.as_ref().ok_or_else(|| {
            AuditError::parse(FORMAT, format!("\"{key}\""), "missing `version`")
        })?;
        let name = split_name_at(resolution)
            .map(|(name, _)| name)
            .ok_or_else(|| {
                AuditError::parse(
                    FORMAT,
                    format!("\"{key}\""),
                    format!("unrecognized resolution `{resolution}`"),
                )
            })?;

        let id = builder.add_node(name, version.as_str(), entry.checksum.as_deref(), false);
        ids.push(Some(id));
        for selector in key.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            selectors.insert(selector.to_owned(), id);
        }
    }

    let lookup = |dep: &str, range: &str| {
        selectors
            .get(&format!("{dep}@{range}"))
            .or_else(|| selectors.get(&format!("{dep}@npm:{range}")))
            .copied()
    };

    for ((key, entry), parent) in entries.iter().zip(&ids) {
        let Some(parent) = *parent else {
            continue;
        };
        for (dep, range, required) in entry.declared() {
            match lookup(dep, range) {
                Some(child) => builder.add_edge(parent, child),
                None if required => {
                    return Err(AuditError::unresolved(*key, format!("{dep}@{range}")));
                }
                None => debug!(package = *key, dependency = dep, "optional dependency not locked"),
            }
        }
    }

    match root_workspace {
        Some(idx) => {
            for (dep, range, required) in entries[idx].1.declared() {
                match lookup(dep, range) {
                    Some(id) => builder.add_root(id),
                    None if required => {
                        return Err(AuditError::unresolved("<root>", format!("{dep}@{range}")));
                    }
                    None => debug!(dependency = dep, "optional root dependency not locked"),
                }
            }
        }
        None => promote_roots(&mut builder, source),
    }

    Ok(builder.build())
}
