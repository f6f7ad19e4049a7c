//! CVSS v2 기본 점수

use serde::Serialize;

use lockaudit_core::types::Severity;

use super::{AttackVector, ScoreError, parse_metrics, weight};

const BASE_METRICS: [&str; 6] = ["AV", "AC", "Au", "C", "I", "A"];

const TEMPORAL_AND_ENVIRONMENTAL: [&str; 8] = ["E", "RL", "RC", "CDP", "TD", "CR", "IR", "AR"];

const ACCESS_VECTOR: [(&str, (f64, AttackVector)); 3] = [
    ("L", (0.395, AttackVector::Local)),
    ("A", (0.646, AttackVector::Adjacent)),
    ("N", (1.0, AttackVector::Network)),
];
const ACCESS_COMPLEXITY: [(&str, f64); 3] = [("H", 0.35), ("M", 0.61), ("L", 0.71)];
const AUTHENTICATION: [(&str, f64); 3] = [("M", 0.45), ("S", 0.56), ("N", 0.704)];
const CIA_IMPACT: [(&str, f64); 3] = [("N", 0.0), ("P", 0.275), ("C", 0.66)];

/// CVSS v2 점수
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V2Score {
    /// 원본 벡터 문자열
    pub vector: String,
    /// 기본 점수
    pub base_score: f64,
    /// impact 부분 점수
    pub impact: f64,
    /// exploitability 부분 점수
    pub exploitability: f64,
    /// 공격 벡터
    #[serde(skip)]
    pub attack_vector: AttackVector,
}

/// v2 벡터의 점수를 계산합니다. 괄호로 감싼 벡터도 허용합니다.
pub fn score(vector: &str) -> Result<V2Score, ScoreError> {
    let body = vector
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(vector);
    let metrics = parse_metrics(body, &BASE_METRICS, &TEMPORAL_AND_ENVIRONMENTAL)?;

    let (av, attack_vector) = weight(&metrics, "AV", &ACCESS_VECTOR)?;
    let ac = weight(&metrics, "AC", &ACCESS_COMPLEXITY)?;
    let au = weight(&metrics, "Au", &AUTHENTICATION)?;
    let c = weight(&metrics, "C", &CIA_IMPACT)?;
    let i = weight(&metrics, "I", &CIA_IMPACT)?;
    let a = weight(&metrics, "A", &CIA_IMPACT)?;

    let impact = 10.41 * (1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a));
    let exploitability = 20.0 * av * ac * au;
    let f_impact = if impact == 0.0 { 0.0 } else { 1.176 };
    let base_score = round_to_one_decimal(((0.6 * impact) + (0.4 * exploitability) - 1.5) * f_impact);

    Ok(V2Score {
        vector: vector.to_owned(),
        base_score,
        impact,
        exploitability,
        attack_vector,
    })
}

fn round_to_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// v2 임계값 표에 따른 심각도
pub fn severity(base_score: f64) -> Severity {
    if base_score < 4.0 {
        Severity::Low
    } else if base_score < 7.0 {
        Severity::Medium
    } else {
        Severity::High
    }
}
