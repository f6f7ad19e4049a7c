//! npm 버전 범위 -- SemVer 범위 포함 여부 판정
//!
//! npm 범위 문법을 `semver` 크레이트의 [`VersionReq`]로 정규화합니다.
//!
//! # 지원 문법
//!
//! - 비교 연산자: `<`, `<=`, `>`, `>=`, `=` (연산자 뒤 공백 허용)
//! - 공백으로 구분된 비교식의 교집합: `>=1.2.0 <2.0.0`
//! - 합집합: `^1.0.0 || ^2.0.0`
//! - 하이픈 범위: `1.2.3 - 2.3.4`
//! - 와일드카드: `*`, `x`, `1.x`, `1.2.*`, 빈 문자열
//! - 축약형: `^1.2.3`, `~1.2.3`, 부분 버전 `1.2`
//!
//! 연산자 없는 버전은 npm과 같이 정확히 일치(`=`)로 해석합니다.
//! 프리릴리스 버전은 같은 `major.minor.patch`의 프리릴리스를 명시한
//! 비교식이 있을 때만 범위에 포함됩니다.

use std::cmp::Ordering;

use semver::{Version, VersionReq};

/// 범위 문자열 파싱 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version range '{range}': {reason}")]
pub struct RangeError {
    /// 원본 범위 문자열
    pub range: String,
    /// 실패 사유
    pub reason: String,
}

/// 파싱된 npm 버전 범위
#[derive(Debug, Clone)]
pub struct NpmRange {
    source: String,
    alternatives: Vec<VersionReq>,
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "~", "^"];

impl NpmRange {
    /// 범위 문자열을 파싱합니다.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let error = |reason: String| RangeError {
            range: input.to_owned(),
            reason,
        };

        let mut alternatives = Vec::new();
        for part in input.split("||") {
            let normalized = normalize_alternative(part).map_err(error)?;
            let req = if normalized.is_empty() {
                VersionReq::STAR
            } else {
                VersionReq::parse(&normalized).map_err(|e| error(e.to_string()))?
            };
            alternatives.push(req);
        }

        Ok(Self {
            source: input.to_owned(),
            alternatives,
        })
    }

    /// 버전이 범위에 포함되는지 확인합니다.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// 원본 범위 문자열
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// `||`로 나뉜 대안 하나를 `semver` 비교식 목록(쉼표 구분)으로 변환합니다.
///
/// 빈 문자열은 모든 버전을 의미합니다.
fn normalize_alternative(input: &str) -> Result<String, String> {
    let tokens = tokenize(input)?;

    let comparators = match tokens.as_slice() {
        [] => Vec::new(),
        [low, dash, high] if dash == "-" => {
            let mut comparators = Vec::new();
            if let Some(low) = comparator(">=", low)? {
                comparators.push(low);
            }
            if let Some(high) = comparator("<=", high)? {
                comparators.push(high);
            }
            comparators
        }
        _ => {
            let mut comparators = Vec::new();
            for token in &tokens {
                if token == "-" {
                    return Err("misplaced hyphen".to_owned());
                }
                let (op, rest) = split_operator(token);
                if let Some(c) = comparator(op, rest)? {
                    comparators.push(c);
                }
            }
            comparators
        }
    };

    Ok(comparators.join(", "))
}

/// 공백/쉼표로 토큰을 나누고, 연산자만 있는 토큰을 다음 토큰과 합칩니다.
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut pending_op: Option<&str> = None;

    for raw in input.split([' ', '\t', ',']).filter(|t| !t.is_empty()) {
        if OPERATORS.contains(&raw) {
            if pending_op.is_some() {
                return Err(format!("consecutive operators near '{raw}'"));
            }
            pending_op = Some(raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{raw}")),
            None => tokens.push(raw.to_owned()),
        }
    }

    if let Some(op) = pending_op {
        return Err(format!("operator '{op}' without version"));
    }
    Ok(tokens)
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "*" | "x" | "X")
}

/// 연산자와 버전을 `semver` 비교식 하나로 변환합니다.
///
/// 모든 버전을 허용하는 비교식(`*`, `>=*`)은 `None`입니다.
fn comparator(op: &str, version: &str) -> Result<Option<String>, String> {
    let version = version.trim_start_matches('=').trim_start_matches('v');
    if version.is_empty() {
        return Err(format!("operator '{op}' without version"));
    }

    // 처음 세 구성 요소 중 와일드카드부터 잘라냄 (1.2.x -> 1.2)
    let parts: Vec<&str> = version.splitn(3, '.').collect();
    let core_end = parts
        .iter()
        .position(|p| is_wildcard(p))
        .unwrap_or(parts.len());
    let truncated = parts[..core_end].join(".");

    if truncated.is_empty() {
        return Ok(match op {
            // 아무 버전보다 작거나 큰 버전은 없음
            "<" | ">" => Some("<0.0.0-0".to_owned()),
            _ => None,
        });
    }

    let op = if op.is_empty() { "=" } else { op };
    Ok(Some(format!("{op}{truncated}")))
}

/// 버전 문자열을 파싱합니다 (`v` 접두사 허용).
pub fn parse_version(input: &str) -> Option<Version> {
    let trimmed = input.trim().trim_start_matches('=').trim_start_matches('v');
    Version::parse(trimmed).ok()
}

/// 범위를 만족하는 가장 높은 버전을 반환합니다.
pub fn max_satisfying<'a>(
    versions: impl IntoIterator<Item = &'a str>,
    range: &NpmRange,
) -> Option<&'a str> {
    versions
        .into_iter()
        .filter_map(|raw| parse_version(raw).map(|parsed| (raw, parsed)))
        .filter(|(_, parsed)| range.matches(parsed))
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(raw, _)| raw)
}

/// 두 버전 문자열을 비교합니다.
///
/// SemVer로 파싱되는 버전이 먼저 오고, 둘 다 파싱되지 않으면 문자열로 비교합니다.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
