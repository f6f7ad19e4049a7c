//! 감사 오케스트레이터 -- 그래프, advisory 조회, 매칭, 필터를 연결
//!
//! [`Auditor`]는 의존성 그래프의 모든 고유 `(name, version)` 키를 배치 단위로
//! [`AdvisorySource`]에 조회하고, 반환된 레코드를 버전 범위로 다시 판정한 뒤
//! 심각도/로컬 전용 필터를 적용해 [`AuditResult`]를 만듭니다.
//!
//! # 흐름
//!
//! ```text
//! lockfile --> LockfileParser --+
//!                               +--> DependencyGraph --> keys --> AdvisorySource (batch)
//! registry --> build_registry --+                                        |
//!                                                                  VulnMatcher
//!                                                                        |
//!                                                           Assessment + AuditFilter
//!                                                                        |
//!                                                                   AuditResult
//! ```
//!
//! 모든 작업은 동기적입니다. 비동기 런타임에서는 `spawn_blocking`으로 호출합니다.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use lockaudit_core::types::Ecosystem;

use crate::config::AuditConfig;
use crate::cvss::Assessment;
use crate::error::AuditError;
use crate::graph::DependencyGraph;
use crate::parser;
use crate::registry;
use crate::source::{AdvisoryMap, AdvisorySource, RegistrySource};
use crate::types::{LockfileFormat, PackageKey};
use crate::vuln::{AuditFilter, AuditResult, Finding, VulnMatcher};

/// 감사 실행기
pub struct Auditor {
    config: AuditConfig,
    filter: AuditFilter,
    source: Arc<dyn AdvisorySource>,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl Auditor {
    /// 설정과 advisory 소스로 감사 실행기를 생성합니다.
    pub fn new(config: AuditConfig, source: Arc<dyn AdvisorySource>) -> Self {
        let filter = config.filter();
        Self {
            config,
            filter,
            source,
        }
    }

    /// 감사 설정
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// 실제 배치 크기 (설정값과 소스 상한 중 작은 값, 최소 1)
    pub fn batch_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.source.max_batch_size())
            .max(1)
    }

    /// lockfile 내용을 감사합니다.
    pub fn audit_lockfile(
        &self,
        content: &str,
        format: LockfileFormat,
        source: &str,
    ) -> Result<AuditResult, AuditError> {
        let graph = parser::parse_lockfile(content, format, source)?;
        self.audit_graph(&graph, format.ecosystem())
    }

    /// 레지스트리에서 패키지 하나와 그 의존성을 감사합니다.
    ///
    /// `version`이 없으면 `latest` dist-tag를 사용합니다. deprecated 버전,
    /// 깊이 제한 같은 경고는 결과의 `warnings`에 담깁니다.
    pub fn audit_package(
        &self,
        registry: &dyn RegistrySource,
        name: &str,
        version: Option<&str>,
    ) -> Result<AuditResult, AuditError> {
        let resolved =
            registry::build_registry_graph(registry, name, version, self.config.max_depth)?;
        let mut result = self.audit_graph(&resolved.graph, Ecosystem::Npm)?;
        result.warnings.extend(resolved.warnings);
        Ok(result)
    }

    /// 의존성 그래프를 감사합니다.
    ///
    /// # Errors
    ///
    /// - `SourceUnavailable`: advisory 배치 조회 실패 (부분 결과 없음)
    /// - `Inconsistent`: 전이 의존성 노드가 루트에서 도달 불가능
    pub fn audit_graph(
        &self,
        graph: &DependencyGraph,
        ecosystem: Ecosystem,
    ) -> Result<AuditResult, AuditError> {
        let keys: Vec<PackageKey> = graph.keys().into_iter().collect();
        let advisories = self.fetch_advisories(ecosystem, &keys)?;

        let matcher = VulnMatcher::new(ecosystem);
        let mut findings = Vec::new();
        let mut filtered = 0usize;

        for (id, node) in graph.all_nodes() {
            let key = node.key();
            let Some(records) = advisories.get(&key) else {
                continue;
            };

            let mut seen = HashSet::new();
            for record in records {
                if !seen.insert(record.id.as_str()) {
                    continue;
                }
                let Some(matched) = matcher.matches(&key, record) else {
                    continue;
                };

                let assessment = Assessment::from_vectors(&record.cvss_vectors);
                if !self.filter.allows(&assessment) {
                    filtered += 1;
                    continue;
                }

                let path = if node.is_direct {
                    None
                } else {
                    let path = graph.shortest_path_from_root(id).ok_or_else(|| {
                        AuditError::Inconsistent(format!("{key} is unreachable from any root"))
                    })?;
                    Some(graph.path_keys(&path))
                };

                debug!(
                    package = %key,
                    advisory = %record.id,
                    severity = %assessment.severity(),
                    "vulnerability matched"
                );
                findings.push(Finding::new(
                    key.clone(),
                    node.is_direct,
                    node.dev,
                    record.clone(),
                    matched.fixed.clone(),
                    assessment,
                    path,
                ));
            }
        }

        let result = AuditResult::from_findings(graph.source(), ecosystem, graph.len(), findings);
        info!(
            source = %result.source,
            packages = result.total_packages,
            findings = result.finding_count(),
            direct = result.direct.len(),
            bundled = result.bundled.len(),
            filtered,
            "audit completed"
        );
        Ok(result)
    }

    /// 키를 배치로 나눠 조회합니다. 한 배치라도 실패하면 전체가 실패합니다.
    fn fetch_advisories(
        &self,
        ecosystem: Ecosystem,
        keys: &[PackageKey],
    ) -> Result<AdvisoryMap, AuditError> {
        let batch_size = self.batch_size();
        let mut advisories = AdvisoryMap::new();

        for (index, batch) in keys.chunks(batch_size).enumerate() {
            debug!(batch = index, keys = batch.len(), "querying advisory source");
            let found = self.source.batch_lookup(ecosystem, batch)?;
            for (key, records) in found {
                advisories.entry(key).or_default().extend(records);
            }
        }

        Ok(advisories)
    }
}
