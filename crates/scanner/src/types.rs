//! 도메인 타입 -- 스캐너 전용 데이터 구조
//!
//! lockfile 형식과 패키지 식별 키를 정의합니다.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use lockaudit_core::types::Ecosystem;

/// lockfile 형식
///
/// 세 형식 모두 npm 레지스트리 패키지를 기술하므로 생태계는 [`Ecosystem::Npm`]입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockfileFormat {
    /// `package-lock.json` / `npm-shrinkwrap.json`
    Npm,
    /// `yarn.lock` (classic v1 및 berry)
    Yarn,
    /// `pnpm-lock.yaml`
    Pnpm,
}

impl LockfileFormat {
    /// 형식 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// 이 형식이 기술하는 패키지 생태계
    pub fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    /// 문자열에서 형식을 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "npm" | "package-lock" | "package-lock.json" => Some(Self::Npm),
            "yarn" | "yarn.lock" => Some(Self::Yarn),
            "pnpm" | "pnpm-lock" | "pnpm-lock.yaml" => Some(Self::Pnpm),
            _ => None,
        }
    }

    /// 파일 이름으로 형식을 판별합니다.
    pub fn detect_from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name().and_then(|n| n.to_str())?;
        match file_name {
            "package-lock.json" | "npm-shrinkwrap.json" => Some(Self::Npm),
            "yarn.lock" => Some(Self::Yarn),
            "pnpm-lock.yaml" | "pnpm-lock.yml" => Some(Self::Pnpm),
            _ => None,
        }
    }
}

impl fmt::Display for LockfileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(name, version)` 패키지 식별 키
///
/// 그래프의 노드 중복 제거와 advisory 조회 키로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    /// 패키지 이름 (scoped 이름 포함, 예: `@babel/core`)
    pub name: String,
    /// 정확히 해석된 버전 (범위가 아님)
    pub version: String,
}

impl PackageKey {
    /// 새 키를 생성합니다.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Package URL을 반환합니다 (예: `pkg:npm/%40babel/core@7.0.0`).
    pub fn purl(&self, ecosystem: Ecosystem) -> String {
        let name = match self.name.strip_prefix('@') {
            Some(scoped) => format!("%40{scoped}"),
            None => self.name.clone(),
        };
        format!("pkg:{}/{}@{}", ecosystem.osv_name(), name, self.version)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
