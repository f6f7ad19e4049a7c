//! CVSS 점수 계산 -- 벡터 문자열 파싱, 기본 점수, 심각도 버킷
//!
//! `CVSS:3.x/`로 시작하는 벡터는 v3, 접두사가 없으면 v2로 해석합니다.
//! 두 버전은 [`Score`]의 명시적인 변형으로 표현됩니다.
//!
//! # 심각도 버킷
//!
//! | 버전 | NONE | LOW | MEDIUM | HIGH | CRITICAL |
//! |---|---|---|---|---|---|
//! | v2 | - | 0.0-3.9 | 4.0-6.9 | 7.0-10.0 | - |
//! | v3 | 0.0 | 0.1-3.9 | 4.0-6.9 | 7.0-8.9 | 9.0-10.0 |
//!
//! # 예시
//!
//! ```
//! use lockaudit_core::types::Severity;
//! use lockaudit_scanner::cvss::score_vector;
//!
//! let score = score_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H").unwrap();
//! assert_eq!(score.base_score(), 9.8);
//! assert_eq!(score.severity(), Severity::Critical);
//! ```

pub mod v2;
pub mod v3;

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tracing::debug;

use lockaudit_core::types::Severity;

pub use v2::V2Score;
pub use v3::V3Score;

/// CVSS 벡터 파싱 실패
///
/// 치명적이지 않습니다. 점수를 계산할 수 없는 레코드의 심각도는 `UNKNOWN`이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    /// 빈 벡터
    #[error("empty CVSS vector")]
    Empty,

    /// 지원하지 않는 CVSS 버전 접두사 (예: `CVSS:4.0`)
    #[error("unsupported CVSS version '{0}'")]
    UnsupportedVersion(String),

    /// `Metric:Value` 형식이 아닌 토큰
    #[error("malformed token '{0}'")]
    MalformedToken(String),

    /// 알 수 없는 메트릭
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    /// 메트릭에 허용되지 않는 값
    #[error("invalid value '{value}' for metric '{metric}'")]
    InvalidValue {
        /// 메트릭 이름
        metric: String,
        /// 잘못된 값
        value: String,
    },

    /// 같은 메트릭이 두 번 등장
    #[error("duplicate metric '{0}'")]
    DuplicateMetric(String),

    /// 필수 기본 메트릭 누락
    #[error("missing required metric '{0}'")]
    MissingMetric(String),
}

impl Serialize for ScoreError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 공격 벡터 (AV 메트릭)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackVector {
    /// 네트워크를 통해 원격으로 공격 가능
    Network,
    /// 인접 네트워크
    Adjacent,
    /// 로컬 접근 필요
    Local,
    /// 물리적 접근 필요 (v3 전용)
    Physical,
}

impl AttackVector {
    /// 네트워크 기원 공격인지 여부
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network)
    }
}

/// 계산된 CVSS 점수
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cvss")]
pub enum Score {
    /// CVSS v2
    #[serde(rename = "2.0")]
    V2(V2Score),
    /// CVSS v3.0 / v3.1
    #[serde(rename = "3")]
    V3(V3Score),
}

impl Score {
    /// 기본 점수 (0.0-10.0)
    pub fn base_score(&self) -> f64 {
        match self {
            Self::V2(s) => s.base_score,
            Self::V3(s) => s.base_score,
        }
    }

    /// 버전별 임계값 표로 계산한 심각도
    pub fn severity(&self) -> Severity {
        match self {
            Self::V2(s) => v2::severity(s.base_score),
            Self::V3(s) => v3::severity(s.base_score),
        }
    }

    /// 원본 벡터 문자열
    pub fn vector(&self) -> &str {
        match self {
            Self::V2(s) => &s.vector,
            Self::V3(s) => &s.vector,
        }
    }

    /// 공격 벡터
    pub fn attack_vector(&self) -> AttackVector {
        match self {
            Self::V2(s) => s.attack_vector,
            Self::V3(s) => s.attack_vector,
        }
    }

    /// v3 점수인지 여부
    pub fn is_v3(&self) -> bool {
        matches!(self, Self::V3(_))
    }
}

/// 벡터 문자열 하나의 점수를 계산합니다.
pub fn score_vector(vector: &str) -> Result<Score, ScoreError> {
    let trimmed = vector.trim();
    if trimmed.is_empty() {
        return Err(ScoreError::Empty);
    }

    if let Some(rest) = trimmed.strip_prefix("CVSS:") {
        let (version, body) = rest.split_once('/').unwrap_or((rest, ""));
        return match version {
            "3.0" => v3::score(0, trimmed, body).map(Score::V3),
            "3.1" => v3::score(1, trimmed, body).map(Score::V3),
            other => Err(ScoreError::UnsupportedVersion(other.to_owned())),
        };
    }

    v2::score(trimmed).map(Score::V2)
}

/// 한 레코드의 모든 벡터에 대한 점수 평가
///
/// 계산에 성공한 점수와 실패한 벡터의 에러를 모두 보관합니다.
/// 우선 점수는 v3가 있으면 v3, 없으면 v2입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assessment {
    /// 계산된 점수 (벡터 순서)
    pub scores: Vec<Score>,
    /// 실패한 벡터의 에러
    pub errors: Vec<ScoreError>,
}

impl Assessment {
    /// 벡터 목록을 평가합니다.
    pub fn from_vectors<S: AsRef<str>>(vectors: &[S]) -> Self {
        let mut assessment = Self::default();
        for vector in vectors {
            match score_vector(vector.as_ref()) {
                Ok(score) => assessment.scores.push(score),
                Err(e) => {
                    debug!(vector = vector.as_ref(), error = %e, "failed to score CVSS vector");
                    assessment.errors.push(e);
                }
            }
        }
        assessment
    }

    /// 우선 점수 (v3 우선)
    pub fn precedence(&self) -> Option<&Score> {
        self.scores
            .iter()
            .find(|s| s.is_v3())
            .or_else(|| self.scores.first())
    }

    /// 우선 점수의 심각도. 점수가 없으면 `UNKNOWN`
    pub fn severity(&self) -> Severity {
        self.precedence()
            .map(Score::severity)
            .unwrap_or(Severity::Unknown)
    }

    /// 우선 점수의 기본 점수
    pub fn base_score(&self) -> Option<f64> {
        self.precedence().map(Score::base_score)
    }

    /// 우선 점수의 공격 벡터
    pub fn attack_vector(&self) -> Option<AttackVector> {
        self.precedence().map(Score::attack_vector)
    }
}

/// `Metric:Value` 토큰을 파싱합니다.
///
/// `required`의 메트릭은 반환 맵에 담기고, `ignored`의 메트릭(temporal,
/// environmental)은 형식만 검사합니다.
pub(crate) fn parse_metrics<'a>(
    body: &'a str,
    required: &[&str],
    ignored: &[&str],
) -> Result<HashMap<&'a str, &'a str>, ScoreError> {
    let mut metrics = HashMap::new();
    let mut seen_ignored = Vec::new();

    for token in body.split('/') {
        let Some((key, value)) = token.split_once(':') else {
            return Err(ScoreError::MalformedToken(token.to_owned()));
        };
        if key.is_empty() || value.is_empty() || value.contains(':') {
            return Err(ScoreError::MalformedToken(token.to_owned()));
        }

        if required.contains(&key) {
            if metrics.insert(key, value).is_some() {
                return Err(ScoreError::DuplicateMetric(key.to_owned()));
            }
        } else if ignored.contains(&key) {
            if seen_ignored.contains(&key) {
                return Err(ScoreError::DuplicateMetric(key.to_owned()));
            }
            seen_ignored.push(key);
        } else {
            return Err(ScoreError::UnknownMetric(key.to_owned()));
        }
    }

    if let Some(missing) = required.iter().find(|m| !metrics.contains_key(*m)) {
        return Err(ScoreError::MissingMetric((*missing).to_owned()));
    }

    Ok(metrics)
}

/// 메트릭 값을 가중치로 변환합니다.
pub(crate) fn weight<T: Copy>(
    metrics: &HashMap<&str, &str>,
    metric: &str,
    table: &[(&str, T)],
) -> Result<T, ScoreError> {
    let value = metrics.get(metric).copied().unwrap_or_default();
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, w)| *w)
        .ok_or_else(|| ScoreError::InvalidValue {
            metric: metric.to_owned(),
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRITICAL_V3: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";
    const LOCAL_V3: &str = "CVSS:3.1/AV:L/AC:L/PR:L/UI:N/S:U/C:H/I:H/A:H";
    const NETWORK_V2: &str = "AV:N/AC:L/Au:N/C:P/I:P/A:P";

    #[test]
    fn dispatches_by_prefix() {
        assert!(score_vector(CRITICAL_V3).unwrap().is_v3());
        assert!(!score_vector(NETWORK_V2).unwrap().is_v3());
    }

    #[test]
    fn critical_v3_vector() {
        let score = score_vector(CRITICAL_V3).unwrap();
        assert_eq!(score.base_score(), 9.8);
        assert_eq!(score.severity(), Severity::Critical);
        assert_eq!(score.attack_vector(), AttackVector::Network);
        assert_eq!(score.vector(), CRITICAL_V3);
    }

    #[test]
    fn empty_vector_is_error() {
        assert_eq!(score_vector("  "), Err(ScoreError::Empty));
    }

    #[test]
    fn unsupported_version_is_error() {
        let err = score_vector("CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N")
            .unwrap_err();
        assert_eq!(err, ScoreError::UnsupportedVersion("4.0".to_owned()));
    }

    #[test]
    fn score_error_names_offending_token() {
        let err = score_vector("CVSS:3.1/AV:N/AC/PR:N").unwrap_err();
        assert_eq!(err, ScoreError::MalformedToken("AC".to_owned()));
        assert!(err.to_string().contains("'AC'"));
    }

    #[test]
    fn score_error_serializes_as_message() {
        let json = serde_json::to_string(&ScoreError::UnknownMetric("XX".to_owned())).unwrap();
        assert_eq!(json, "\"unknown metric 'XX'\"");
    }

    #[test]
    fn assessment_prefers_v3() {
        let assessment = Assessment::from_vectors(&[NETWORK_V2, LOCAL_V3]);
        assert_eq!(assessment.scores.len(), 2);
        let precedence = assessment.precedence().unwrap();
        assert!(precedence.is_v3());
        assert_eq!(assessment.base_score(), Some(7.8));
        assert_eq!(assessment.severity(), Severity::High);
        assert_eq!(assessment.attack_vector(), Some(AttackVector::Local));
    }

    #[test]
    fn assessment_falls_back_to_v2_when_v3_fails() {
        let assessment = Assessment::from_vectors(&["CVSS:3.1/AV:Q", NETWORK_V2]);
        assert_eq!(assessment.errors.len(), 1);
        assert_eq!(assessment.base_score(), Some(7.5));
        assert_eq!(assessment.severity(), Severity::High);
    }

    #[test]
    fn assessment_without_vectors_is_unknown() {
        let assessment = Assessment::from_vectors::<&str>(&[]);
        assert_eq!(assessment.severity(), Severity::Unknown);
        assert_eq!(assessment.base_score(), None);
        assert!(assessment.errors.is_empty());
    }

    #[test]
    fn assessment_with_only_bad_vectors_is_unknown_and_keeps_errors() {
        let assessment = Assessment::from_vectors(&["garbage"]);
        assert_eq!(assessment.severity(), Severity::Unknown);
        assert_eq!(assessment.errors.len(), 1);
    }
}
