//! 스캐너 에러 타입
//!
//! [`AuditError`]는 스캐너 크레이트 내에서 발생할 수 있는 모든 치명적 에러를 나타냅니다.
//! `From<AuditError> for LockauditError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **Lockfile 파싱**: `LockfileParse`, `UnresolvedDependency`
//! - **소스 조회**: `SourceUnavailable`, `PackageNotFound`
//! - **advisory DB**: `AdvisoryDbLoad`, `AdvisoryDbParse`
//! - **내부 일관성**: `Inconsistent`
//! - **설정**: `Config`
//! - **입력**: `Io`, `FileTooBig`, `EmptyInput`
//!
//! CVSS 점수 계산 실패는 치명적이지 않으므로 [`ScoreError`](crate::cvss::ScoreError)로
//! 별도 관리됩니다.

use lockaudit_core::error::{AuditFailure, ConfigError, LockauditError};

/// 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// lockfile 구조가 잘못됨
    #[error("{format} lockfile parse error at {location}: {reason}")]
    LockfileParse {
        /// lockfile 형식 (npm, yarn, pnpm)
        format: String,
        /// 문제 위치 (`line 12` 또는 섹션 경로)
        location: String,
        /// 실패 사유
        reason: String,
    },

    /// 패키지가 참조하는 의존성이 lockfile 인덱스에 없음
    #[error("unresolved dependency: {package} requires {dependency}")]
    UnresolvedDependency {
        /// 참조하는 쪽 (패키지 키 또는 `<root>`)
        package: String,
        /// 찾지 못한 의존성 (`name@range`)
        dependency: String,
    },

    /// advisory/registry 소스 실패
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// 레지스트리에 요청한 패키지 또는 버전이 없음
    #[error("package not found: {name}{}", version_suffix(.version))]
    PackageNotFound {
        /// 패키지 이름
        name: String,
        /// 요청한 버전
        version: Option<String>,
    },

    /// 내부 일관성 위반 (예: 루트에서 도달할 수 없는 노드)
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),

    /// advisory DB 로딩 실패
    #[error("advisory db load error: {path}: {reason}")]
    AdvisoryDbLoad {
        /// DB 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// advisory DB 파싱 실패
    #[error("advisory db parse error: {0}")]
    AdvisoryDbParse(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 입력 크기 초과
    #[error("input too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 입력 경로 (`-`는 표준 입력)
        path: String,
        /// 실제 크기 (바이트)
        size: usize,
        /// 최대 허용 크기 (바이트)
        max: usize,
    },

    /// 빈 입력
    #[error("empty input: {0}")]
    EmptyInput(String),
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_deref()
        .map(|v| format!("@{v}"))
        .unwrap_or_default()
}

impl AuditError {
    /// lockfile 파싱 에러를 생성합니다.
    pub(crate) fn parse(
        format: impl Into<String>,
        location: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::LockfileParse {
            format: format.into(),
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// 해석되지 않은 의존성 에러를 생성합니다.
    pub(crate) fn unresolved(package: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::UnresolvedDependency {
            package: package.into(),
            dependency: dependency.into(),
        }
    }
}

impl From<AuditError> for LockauditError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::LockfileParse { .. } => {
                LockauditError::Audit(AuditFailure::ParseFailed(err.to_string()))
            }
            AuditError::UnresolvedDependency {
                package,
                dependency,
            } => LockauditError::Audit(AuditFailure::UnresolvedDependency(format!(
                "{package} requires {dependency}"
            ))),
            AuditError::SourceUnavailable(msg) => {
                LockauditError::Audit(AuditFailure::SourceUnavailable(msg))
            }
            AuditError::PackageNotFound { .. } => {
                LockauditError::Audit(AuditFailure::PackageNotFound(err.to_string()))
            }
            AuditError::Inconsistent(msg) => LockauditError::Audit(AuditFailure::Inconsistent(msg)),
            AuditError::AdvisoryDbLoad { .. } | AuditError::AdvisoryDbParse(_) => {
                LockauditError::Audit(AuditFailure::SourceUnavailable(err.to_string()))
            }
            AuditError::Config { field, reason } => {
                LockauditError::Config(ConfigError::InvalidValue { field, reason })
            }
            AuditError::Io { path, source } => LockauditError::Io(std::io::Error::new(
                source.kind(),
                format!("{path}: {source}"),
            )),
            AuditError::FileTooBig { .. } | AuditError::EmptyInput(_) => {
                LockauditError::Audit(AuditFailure::InvalidInput(err.to_string()))
            }
        }
    }
}
