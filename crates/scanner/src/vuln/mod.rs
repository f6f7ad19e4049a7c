//! 취약점 매칭 -- advisory 레코드와 패키지 버전 대조
//!
//! [`VulnMatcher`]는 노드의 정확한 버전이 레코드의 영향 범위 중 하나 이상에
//! 포함되는지 판정합니다. 판정 결과는 [`Finding`]으로 만들어져
//! [`AuditResult`]에 직접(direct)/번들(bundled)로 나뉘어 담깁니다.
//!
//! # 실패 시 닫힘 (fail-closed)
//!
//! 해당 생태계에 대해 파싱 가능한 범위가 하나도 없는 레코드는
//! `debug` 로그와 함께 건너뜁니다. 파싱할 수 없는 노드 버전도 같습니다.

pub mod db;
pub mod osv;
pub mod range;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lockaudit_core::types::{Ecosystem, Severity};

use crate::cvss::Assessment;
use crate::types::PackageKey;

pub use db::AdvisoryDb;
pub use range::{NpmRange, RangeError};

/// advisory 레코드 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// advisory ID (예: `GHSA-xxxx-xxxx-xxxx`)
    pub id: String,
    /// 별칭 (CVE ID 등)
    #[serde(default)]
    pub aliases: Vec<String>,
    /// 요약
    #[serde(default)]
    pub summary: Option<String>,
    /// 생태계/패키지별 영향 범위
    #[serde(default)]
    pub affected: Vec<AffectedRange>,
    /// 원본 CVSS 벡터 문자열 (v2 및/또는 v3)
    #[serde(default)]
    pub cvss_vectors: Vec<String>,
}

impl VulnerabilityRecord {
    /// 첫 번째 `CVE-` 별칭
    pub fn cve_id(&self) -> Option<&str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .find(|a| a.starts_with("CVE-"))
    }

    /// 주어진 생태계/패키지의 영향 범위
    pub fn affected_for<'a, 'p>(
        &'a self,
        ecosystem: Ecosystem,
        package: &'p str,
    ) -> impl Iterator<Item = &'a AffectedRange> + use<'a, 'p> {
        self.affected
            .iter()
            .filter(move |a| a.ecosystem == ecosystem && a.package == package)
    }

    /// 주어진 생태계/패키지의 범위 문자열
    pub fn ranges_for<'a>(
        &'a self,
        ecosystem: Ecosystem,
        package: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.affected_for(ecosystem, package).map(|a| a.range.as_str())
    }
}

/// 영향받는 버전 범위 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedRange {
    /// 패키지 생태계
    pub ecosystem: Ecosystem,
    /// 패키지 이름
    pub package: String,
    /// npm 범위 문법의 범위 문자열 (예: `>=1.0.0 <1.2.3`)
    pub range: String,
    /// 이 구간을 닫는 수정 버전. `last_affected`나 열린 구간이면 `None`
    #[serde(default)]
    pub fixed: Option<String>,
}

/// 버전 범위 매처
#[derive(Debug, Clone, Copy)]
pub struct VulnMatcher {
    ecosystem: Ecosystem,
}

impl VulnMatcher {
    /// 새 매처를 생성합니다.
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self { ecosystem }
    }

    /// 패키지 버전을 포함하는 첫 번째 영향 범위를 찾습니다.
    ///
    /// 포함하는 범위가 없으면 `None`입니다.
    pub fn matches<'r>(
        &self,
        key: &PackageKey,
        record: &'r VulnerabilityRecord,
    ) -> Option<&'r AffectedRange> {
        let Some(version) = range::parse_version(&key.version) else {
            debug!(package = %key, advisory = %record.id, "unparseable package version, skipping");
            return None;
        };

        let mut parsed_any = false;
        for affected in record.affected_for(self.ecosystem, &key.name) {
            match NpmRange::parse(&affected.range) {
                Ok(range) => {
                    parsed_any = true;
                    if range.matches(&version) {
                        return Some(affected);
                    }
                }
                Err(e) => {
                    debug!(advisory = %record.id, error = %e, "ignoring unparseable range");
                }
            }
        }

        if !parsed_any {
            debug!(
                package = %key,
                advisory = %record.id,
                ecosystem = %self.ecosystem,
                "no parseable affected range, skipping record"
            );
        }
        None
    }
}

/// 심각도/로컬 전용 필터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// 허용할 심각도 집합. `None`이면 `UNKNOWN`을 포함해 전부 허용
    pub severities: Option<BTreeSet<Severity>>,
    /// 우선 벡터의 공격 벡터가 네트워크인 레코드 제외
    pub local_only: bool,
}

impl AuditFilter {
    /// 평가 결과가 필터를 통과하는지 확인합니다.
    ///
    /// 벡터가 없는 레코드는 `local_only`로 제외되지 않습니다.
    pub fn allows(&self, assessment: &Assessment) -> bool {
        if let Some(allowed) = &self.severities
            && !allowed.contains(&assessment.severity())
        {
            return false;
        }

        if self.local_only
            && assessment
                .attack_vector()
                .is_some_and(|av| av.is_network())
        {
            return false;
        }

        true
    }
}

/// 발견 항목 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 루트 매니페스트에 직접 선언된 패키지
    Direct,
    /// 전이적으로 포함된 패키지
    Bundled,
    /// 전이적으로 포함된 개발 전용 패키지
    Dev,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Bundled => write!(f, "bundled"),
            Self::Dev => write!(f, "dev"),
        }
    }
}

/// (노드, 레코드) 매칭 하나
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// 매칭된 패키지
    pub package: PackageKey,
    /// 직접 의존성 여부
    pub is_direct: bool,
    /// 개발 전용 여부
    pub dev: bool,
    /// advisory 레코드
    pub record: VulnerabilityRecord,
    /// 매칭된 구간의 수정 버전
    pub fixed_version: Option<String>,
    /// 우선 점수의 심각도
    pub severity: Severity,
    /// 우선 점수
    pub base_score: Option<f64>,
    /// 모든 벡터의 점수 평가
    pub assessment: Assessment,
    /// 루트에서 이 패키지까지의 최단 경로 (직접 의존성은 `None`)
    pub path: Option<Vec<PackageKey>>,
}

impl Finding {
    /// 매칭 결과로 발견 항목을 생성합니다.
    pub fn new(
        package: PackageKey,
        is_direct: bool,
        dev: bool,
        record: VulnerabilityRecord,
        fixed_version: Option<String>,
        assessment: Assessment,
        path: Option<Vec<PackageKey>>,
    ) -> Self {
        Self {
            severity: assessment.severity(),
            base_score: assessment.base_score(),
            package,
            is_direct,
            dev,
            record,
            fixed_version,
            assessment,
            path,
        }
    }

    /// 보고서 분류
    pub fn category(&self) -> Category {
        if self.is_direct {
            Category::Direct
        } else if self.dev {
            Category::Dev
        } else {
            Category::Bundled
        }
    }

    /// 경로의 시작 루트 (업데이트 안내용)
    pub fn root(&self) -> Option<&PackageKey> {
        self.path.as_ref().and_then(|p| p.first())
    }

    /// 결정적 출력 순서: 이름, 버전, advisory ID
    pub fn sort_order(&self, other: &Self) -> Ordering {
        self.package
            .name
            .cmp(&other.package.name)
            .then_with(|| range::compare_versions(&self.package.version, &other.package.version))
            .then_with(|| self.record.id.cmp(&other.record.id))
    }
}

/// 심각도별 발견 항목 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub none: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    /// 심각도 하나를 셉니다.
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::None => self.none += 1,
            Severity::Unknown => self.unknown += 1,
        }
    }

    /// 심각도별 개수를 반환합니다.
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::None => self.none,
            Severity::Unknown => self.unknown,
        }
    }

    /// 전체 발견 항목 수를 반환합니다.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.none + self.unknown
    }
}

/// 감사 결과
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    /// 감사 대상 (lockfile 경로, `-`, 또는 패키지 식별자)
    pub source: String,
    /// 패키지 생태계
    pub ecosystem: Ecosystem,
    /// 그래프의 고유 패키지 수
    pub total_packages: usize,
    /// 직접 의존성의 발견 항목
    pub direct: Vec<Finding>,
    /// 전이 의존성의 발견 항목
    pub bundled: Vec<Finding>,
    /// 심각도별 개수 (필터 적용 후)
    pub counts: SeverityCounts,
    /// 감사 중 발생한 경고 (예: deprecated 패키지)
    pub warnings: Vec<String>,
}

impl AuditResult {
    /// 발견 항목을 정렬하고 직접/번들로 나눠 결과를 만듭니다.
    pub fn from_findings(
        source: impl Into<String>,
        ecosystem: Ecosystem,
        total_packages: usize,
        mut findings: Vec<Finding>,
    ) -> Self {
        findings.sort_by(Finding::sort_order);

        let mut counts = SeverityCounts::default();
        for finding in &findings {
            counts.add(finding.severity);
        }

        let (direct, bundled): (Vec<_>, Vec<_>) =
            findings.into_iter().partition(|f| f.is_direct);

        Self {
            source: source.into(),
            ecosystem,
            total_packages,
            direct,
            bundled,
            counts,
            warnings: Vec::new(),
        }
    }

    /// 전체 발견 항목 수
    pub fn finding_count(&self) -> usize {
        self.direct.len() + self.bundled.len()
    }

    /// 발견 항목이 있는지 여부
    pub fn has_findings(&self) -> bool {
        self.finding_count() > 0
    }

    /// 직접, 번들 순으로 모든 발견 항목을 순회합니다.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.direct.iter().chain(self.bundled.iter())
    }
}
