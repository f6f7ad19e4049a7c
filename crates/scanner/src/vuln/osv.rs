//! OSV 문서 디코딩
//!
//! osv.dev가 반환하는 OSV 스키마 JSON을 [`VulnerabilityRecord`]로 변환합니다.
//! 최상위가 배열인 문서와 `{"vulns": [...]}` 형태의 단일 질의 응답을 모두 받습니다.
//!
//! `SEMVER`/`ECOSYSTEM` 범위의 이벤트는 npm 비교자 문자열이 됩니다.
//!
//! ```text
//! introduced 0, fixed 4.17.21        -> <4.17.21
//! introduced 1.0.0, last_affected 1.2 -> >=1.0.0 <=1.2
//! introduced 2.0.0                    -> >=2.0.0
//! ```
//!
//! `fixed`로 닫힌 구간만 수정 버전을 가집니다.

use serde::Deserialize;
use tracing::debug;

use lockaudit_core::types::Ecosystem;

use super::{AffectedRange, VulnerabilityRecord};
use crate::error::AuditError;

/// OSV 취약점 객체
#[derive(Debug, Clone, Deserialize)]
pub struct OsvVulnerability {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub severity: Vec<OsvSeverity>,
    #[serde(default)]
    pub affected: Vec<OsvAffected>,
}

/// `severity[]` 항목 (`CVSS_V2`, `CVSS_V3`, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct OsvSeverity {
    #[serde(rename = "type")]
    pub kind: String,
    pub score: String,
}

/// `affected[]` 항목
#[derive(Debug, Clone, Deserialize)]
pub struct OsvAffected {
    #[serde(default)]
    pub package: Option<OsvPackage>,
    #[serde(default)]
    pub ranges: Vec<OsvRange>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub severity: Vec<OsvSeverity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsvPackage {
    pub ecosystem: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsvRange {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub events: Vec<OsvEvent>,
}

/// 범위 이벤트. 한 객체에는 필드 하나만 들어 있습니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvEvent {
    #[serde(default)]
    pub introduced: Option<String>,
    #[serde(default)]
    pub fixed: Option<String>,
    #[serde(default)]
    pub last_affected: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OsvDocument {
    List(Vec<OsvVulnerability>),
    Query {
        #[serde(default)]
        vulns: Vec<OsvVulnerability>,
    },
}

/// OSV JSON 문서를 레코드 목록으로 디코딩합니다.
pub fn parse_document(json: &str) -> Result<Vec<VulnerabilityRecord>, AuditError> {
    let document: OsvDocument = serde_json::from_str(json)
        .map_err(|e| AuditError::AdvisoryDbParse(format!("invalid OSV document: {e}")))?;

    let vulns = match document {
        OsvDocument::List(vulns) => vulns,
        OsvDocument::Query { vulns } => vulns,
    };

    Ok(vulns.into_iter().map(OsvVulnerability::into_record).collect())
}

impl OsvVulnerability {
    /// 지원하는 생태계의 `affected` 항목만 남겨 레코드로 변환합니다.
    pub fn into_record(self) -> VulnerabilityRecord {
        let mut cvss_vectors = Vec::new();
        collect_cvss(&self.severity, &mut cvss_vectors);

        let mut affected = Vec::new();

        for entry in &self.affected {
            collect_cvss(&entry.severity, &mut cvss_vectors);

            let Some(package) = &entry.package else {
                continue;
            };
            let Some(ecosystem) = Ecosystem::from_str_loose(&package.ecosystem) else {
                debug!(
                    advisory = %self.id,
                    ecosystem = %package.ecosystem,
                    "skipping affected entry for unsupported ecosystem"
                );
                continue;
            };

            let mut first_fix = None;
            for range in &entry.ranges {
                if !matches!(range.kind.as_str(), "SEMVER" | "ECOSYSTEM") {
                    debug!(advisory = %self.id, kind = %range.kind, "skipping non-semver range");
                    continue;
                }
                for (comparator, fixed) in events_to_ranges(&range.events) {
                    if first_fix.is_none() {
                        first_fix.clone_from(&fixed);
                    }
                    affected.push(AffectedRange {
                        ecosystem,
                        package: package.name.clone(),
                        range: comparator,
                        fixed,
                    });
                }
            }

            // 명시 버전 목록에는 구간이 없으므로 같은 항목의 첫 수정 버전을 씁니다.
            for version in &entry.versions {
                affected.push(AffectedRange {
                    ecosystem,
                    package: package.name.clone(),
                    range: format!("={version}"),
                    fixed: first_fix.clone(),
                });
            }
        }

        VulnerabilityRecord {
            id: self.id,
            aliases: self.aliases,
            summary: self.summary.or(self.details),
            affected,
            cvss_vectors,
        }
    }
}

fn collect_cvss(severity: &[OsvSeverity], out: &mut Vec<String>) {
    for entry in severity {
        if matches!(entry.kind.as_str(), "CVSS_V2" | "CVSS_V3") && !out.contains(&entry.score) {
            out.push(entry.score.clone());
        }
    }
}

/// 이벤트 목록을 구간별 `(비교자 문자열, 수정 버전)`으로 바꿉니다.
///
/// `introduced: "0"`은 하한이 없는 구간입니다. `limit`은 git 범위 전용이라 무시합니다.
fn events_to_ranges(events: &[OsvEvent]) -> Vec<(String, Option<String>)> {
    let mut ranges = Vec::new();
    let mut open: Option<Option<String>> = None;

    for event in events {
        if let Some(introduced) = &event.introduced {
            if let Some(lower) = open.take() {
                ranges.push((interval(lower.as_deref(), None), None));
            }
            let lower = (introduced != "0").then(|| introduced.clone());
            open = Some(lower);
        } else if let Some(fixed) = &event.fixed {
            let lower = open.take().flatten();
            ranges.push((
                interval(lower.as_deref(), Some(&format!("<{fixed}"))),
                Some(fixed.clone()),
            ));
        } else if let Some(last) = &event.last_affected {
            let lower = open.take().flatten();
            ranges.push((interval(lower.as_deref(), Some(&format!("<={last}"))), None));
        }
    }

    if let Some(lower) = open {
        ranges.push((interval(lower.as_deref(), None), None));
    }
    ranges
}

fn interval(lower: Option<&str>, upper: Option<&str>) -> String {
    match (lower, upper) {
        (Some(lower), Some(upper)) => format!(">={lower} {upper}"),
        (Some(lower), None) => format!(">={lower}"),
        (None, Some(upper)) => upper.to_owned(),
        (None, None) => "*".to_owned(),
    }
}
