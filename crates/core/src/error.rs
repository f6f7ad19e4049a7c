//! 에러 타입 -- 도메인별 에러 정의

/// lockaudit 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LockauditError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 감사(audit) 실행 에러
    #[error("audit error: {0}")]
    Audit(#[from] AuditFailure),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 감사 실패 -- 부분 결과 없이 전체 감사를 중단시키는 에러
#[derive(Debug, thiserror::Error)]
pub enum AuditFailure {
    /// lockfile 구조가 잘못됨
    #[error("lockfile parse failed: {0}")]
    ParseFailed(String),

    /// 인덱스에 없는 패키지를 참조함
    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// advisory/registry 소스 실패
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// 레지스트리에 요청한 패키지/버전이 없음
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// 입력 거부 (빈 입력, 크기 초과, 형식 미지정)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 내부 일관성 위반
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),
}
