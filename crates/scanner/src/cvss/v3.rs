//! CVSS v3.0 / v3.1 기본 점수

use serde::Serialize;

use lockaudit_core::types::Severity;

use super::{AttackVector, ScoreError, parse_metrics, weight};

const BASE_METRICS: [&str; 8] = ["AV", "AC", "PR", "UI", "S", "C", "I", "A"];

const TEMPORAL_AND_ENVIRONMENTAL: [&str; 14] = [
    "E", "RL", "RC", "CR", "IR", "AR", "MAV", "MAC", "MPR", "MUI", "MS", "MC", "MI", "MA",
];

const ATTACK_VECTOR: [(&str, (f64, AttackVector)); 4] = [
    ("N", (0.85, AttackVector::Network)),
    ("A", (0.62, AttackVector::Adjacent)),
    ("L", (0.55, AttackVector::Local)),
    ("P", (0.2, AttackVector::Physical)),
];
const ATTACK_COMPLEXITY: [(&str, f64); 2] = [("L", 0.77), ("H", 0.44)];
// (scope unchanged, scope changed)
const PRIVILEGES_REQUIRED: [(&str, (f64, f64)); 3] =
    [("N", (0.85, 0.85)), ("L", (0.62, 0.68)), ("H", (0.27, 0.5))];
const USER_INTERACTION: [(&str, f64); 2] = [("N", 0.85), ("R", 0.62)];
const SCOPE: [(&str, bool); 2] = [("U", false), ("C", true)];
const CIA_IMPACT: [(&str, f64); 3] = [("H", 0.56), ("L", 0.22), ("N", 0.0)];

/// CVSS v3 점수
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V3Score {
    /// 마이너 버전 (`3.0` -> 0, `3.1` -> 1)
    pub minor: u8,
    /// 원본 벡터 문자열
    pub vector: String,
    /// 기본 점수
    pub base_score: f64,
    /// impact 부분 점수
    pub impact: f64,
    /// exploitability 부분 점수
    pub exploitability: f64,
    /// 범위 변경(S:C) 여부
    pub scope_changed: bool,
    /// 공격 벡터
    #[serde(skip)]
    pub attack_vector: AttackVector,
}

/// `CVSS:3.x/` 접두사 뒤의 메트릭을 파싱해 점수를 계산합니다.
pub fn score(minor: u8, vector: &str, body: &str) -> Result<V3Score, ScoreError> {
    let metrics = parse_metrics(body, &BASE_METRICS, &TEMPORAL_AND_ENVIRONMENTAL)?;

    let (av, attack_vector) = weight(&metrics, "AV", &ATTACK_VECTOR)?;
    let ac = weight(&metrics, "AC", &ATTACK_COMPLEXITY)?;
    let (pr_unchanged, pr_changed) = weight(&metrics, "PR", &PRIVILEGES_REQUIRED)?;
    let ui = weight(&metrics, "UI", &USER_INTERACTION)?;
    let scope_changed = weight(&metrics, "S", &SCOPE)?;
    let c = weight(&metrics, "C", &CIA_IMPACT)?;
    let i = weight(&metrics, "I", &CIA_IMPACT)?;
    let a = weight(&metrics, "A", &CIA_IMPACT)?;

    let pr = if scope_changed { pr_changed } else { pr_unchanged };

    let iss = 1.0 - ((1.0 - c) * (1.0 - i) * (1.0 - a));
    let impact = if scope_changed {
        7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
    } else {
        6.42 * iss
    };
    let exploitability = 8.22 * av * ac * pr * ui;

    let base_score = if impact <= 0.0 {
        0.0
    } else if scope_changed {
        roundup((1.08 * (impact + exploitability)).min(10.0))
    } else {
        roundup((impact + exploitability).min(10.0))
    };

    Ok(V3Score {
        minor,
        vector: vector.to_owned(),
        base_score,
        impact,
        exploitability,
        scope_changed,
        attack_vector,
    })
}

/// 소수점 첫째 자리로 올림합니다.
///
/// 부동소수점 오차로 `4.0`이 `4.1`이 되지 않도록 정수 연산으로 처리합니다.
fn roundup(value: f64) -> f64 {
    let scaled = (value * 100_000.0).round() as i64;
    if scaled % 10_000 == 0 {
        scaled as f64 / 100_000.0
    } else {
        ((scaled / 10_000) + 1) as f64 / 10.0
    }
}

/// v3 임계값 표에 따른 심각도
pub fn severity(base_score: f64) -> Severity {
    if base_score <= 0.0 {
        Severity::None
    } else if base_score < 4.0 {
        Severity::Low
    } else if base_score < 7.0 {
        Severity::Medium
    } else if base_score < 9.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}
