//! 도메인 타입 -- 스캐너와 CLI가 공유하는 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 취약점 심각도 버킷
///
/// CVSS 점수에서 파생되는 다섯 개의 버킷(`None`..`Critical`)과,
/// 벡터가 없거나 점수를 계산할 수 없는 경우의 `Unknown`으로 구성됩니다.
/// `Ord` 구현은 `Unknown < None < Low < Medium < High < Critical` 순서입니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 점수 없음 (벡터 없음 또는 파싱 실패)
    #[default]
    Unknown,
    /// CVSS 0.0 (v3 전용)
    None,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 모든 심각도 값 (높은 순)
    pub const ALL: [Severity; 6] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::None,
        Self::Unknown,
    ];

    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unknown" | "n/a" => Some(Self::Unknown),
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 정렬/표시용 우선순위 (작을수록 심각)
    pub fn priority(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::None => 4,
            Self::Unknown => 5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::None => write!(f, "NONE"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 패키지 생태계
///
/// advisory 소스 조회 시 사용하는 생태계 식별자입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// JavaScript/TypeScript (npm, yarn, pnpm 공통 레지스트리)
    Npm,
}

impl Ecosystem {
    /// OSV 데이터베이스에서 사용하는 생태계 이름을 반환합니다.
    pub fn osv_name(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
        }
    }

    /// 문자열에서 생태계를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "npm" | "node" | "javascript" | "js" | "yarn" | "pnpm" => Some(Self::Npm),
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.osv_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Unknown < Severity::None);
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_default_is_unknown() {
        assert_eq!(Severity::default(), Severity::Unknown);
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::None.to_string(), "NONE");
        assert_eq!(Severity::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("high"), Some(Severity::High));
        assert_eq!(Severity::from_str_loose(" CRITICAL "), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("moderate"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_loose("none"), Some(Severity::None));
        assert_eq!(Severity::from_str_loose("unknown"), Some(Severity::Unknown));
        assert_eq!(Severity::from_str_loose("severe"), None);
    }

    #[test]
    fn severity_priority_is_inverse_of_ordering() {
        assert!(Severity::Critical.priority() < Severity::High.priority());
        assert!(Severity::High.priority() < Severity::Medium.priority());
        assert!(Severity::Low.priority() < Severity::Unknown.priority());
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let back: Severity = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(back, Severity::Critical);
    }

    #[test]
    fn ecosystem_names() {
        assert_eq!(Ecosystem::Npm.osv_name(), "npm");
        assert_eq!(Ecosystem::Npm.to_string(), "npm");
        assert_eq!(Ecosystem::from_str_loose("PNPM"), Some(Ecosystem::Npm));
        assert_eq!(Ecosystem::from_str_loose("cargo"), None);
    }
}
