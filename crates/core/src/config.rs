//! 설정 관리 -- lockaudit.toml 파싱 및 런타임 설정
//!
//! [`LockauditConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOCKAUDIT_ADVISORY_DB_PATH=/srv/osv` 형식)
//! 3. 설정 파일 (`lockaudit.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), lockaudit_core::error::LockauditError> {
//! use lockaudit_core::config::LockauditConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LockauditConfig::load("lockaudit.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LockauditConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LockauditError};
use crate::types::Severity;

/// advisory 배치 조회 최대 크기 (OSV querybatch 상한)
pub const MAX_ADVISORY_BATCH_SIZE: usize = 1000;

/// 레지스트리 기반 감사 최대 깊이 상한
const MAX_REGISTRY_DEPTH: usize = 64;

/// lockaudit 통합 설정
///
/// `lockaudit.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockauditConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// advisory 데이터베이스 설정
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    /// 레지스트리 설정 (패키지 이름 감사용)
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 감사 필터 및 입력 제한
    #[serde(default)]
    pub audit: AuditSection,
}

impl LockauditConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LockauditError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    ///
    /// 파일이 존재하지만 파싱할 수 없으면 에러를 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, LockauditError> {
        match Self::load(path.as_ref()).await {
            Err(LockauditError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LockauditError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LockauditError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LockauditError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LockauditError> {
        toml::from_str(toml_str).map_err(|e| {
            LockauditError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOCKAUDIT_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOCKAUDIT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOCKAUDIT_GENERAL_LOG_FORMAT");

        // Advisory
        override_string(&mut self.advisory.db_path, "LOCKAUDIT_ADVISORY_DB_PATH");
        override_usize(&mut self.advisory.batch_size, "LOCKAUDIT_ADVISORY_BATCH_SIZE");

        // Registry
        override_string(&mut self.registry.path, "LOCKAUDIT_REGISTRY_PATH");
        override_usize(&mut self.registry.max_depth, "LOCKAUDIT_REGISTRY_MAX_DEPTH");

        // Audit
        override_csv(&mut self.audit.severities, "LOCKAUDIT_AUDIT_SEVERITIES");
        override_bool(&mut self.audit.local_only, "LOCKAUDIT_AUDIT_LOCAL_ONLY");
        override_usize(&mut self.audit.max_file_size, "LOCKAUDIT_AUDIT_MAX_FILE_SIZE");
        override_usize(&mut self.audit.max_stdin_size, "LOCKAUDIT_AUDIT_MAX_STDIN_SIZE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LockauditError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.advisory.batch_size == 0 || self.advisory.batch_size > MAX_ADVISORY_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "advisory.batch_size".to_owned(),
                reason: format!("must be 1-{MAX_ADVISORY_BATCH_SIZE}"),
            }
            .into());
        }

        if self.registry.max_depth == 0 || self.registry.max_depth > MAX_REGISTRY_DEPTH {
            return Err(ConfigError::InvalidValue {
                field: "registry.max_depth".to_owned(),
                reason: format!("must be 1-{MAX_REGISTRY_DEPTH}"),
            }
            .into());
        }

        for severity in &self.audit.severities {
            if Severity::from_str_loose(severity).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "audit.severities".to_owned(),
                    reason: format!(
                        "unknown severity '{severity}' (expected: none, low, medium, high, critical, unknown)"
                    ),
                }
                .into());
            }
        }

        if self.audit.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audit.max_file_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.audit.max_stdin_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audit.max_stdin_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// advisory 데이터베이스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// OSV 형식 advisory 파일 디렉토리 (`npm.json`)
    pub db_path: String,
    /// 배치당 최대 조회 키 수
    pub batch_size: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            db_path: "/var/lib/lockaudit/advisories".to_owned(),
            batch_size: MAX_ADVISORY_BATCH_SIZE,
        }
    }
}

/// 레지스트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// npm 레지스트리 문서(`<name>.json`) 디렉토리
    pub path: String,
    /// 의존성 전개 최대 깊이
    pub max_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/lockaudit/registry".to_owned(),
            max_depth: 6,
        }
    }
}

/// 감사 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// 보고할 심각도 목록 (비어 있으면 전부)
    pub severities: Vec<String>,
    /// 네트워크 공격 벡터 advisory 제외 여부
    pub local_only: bool,
    /// lockfile 최대 크기 (바이트)
    pub max_file_size: usize,
    /// 표준 입력 최대 크기 (바이트)
    pub max_stdin_size: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            severities: Vec::new(),
            local_only: false,
            max_file_size: 100 * 1024 * 1024, // 100 MB
            max_stdin_size: 50 * 1024 * 1024, // 50 MB
        }
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.to_lowercase().as_str() {
            "true" | "1" | "yes" => *target = true,
            "false" | "0" | "no" => *target = false,
            _ => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = LockauditConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.advisory.batch_size, 1000);
        assert_eq!(config.registry.max_depth, 6);
        assert!(config.audit.severities.is_empty());
        assert!(!config.audit.local_only);
    }

    #[test]
    fn default_config_passes_validation() {
        LockauditConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LockauditConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.advisory.db_path, "/var/lib/lockaudit/advisories");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[audit]
severities = ["high", "critical"]
local_only = true
"#;
        let config = LockauditConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.audit.severities, vec!["high", "critical"]);
        assert!(config.audit.local_only);
        assert_eq!(config.audit.max_file_size, 100 * 1024 * 1024);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = LockauditConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LockauditError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LockauditConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LockauditConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = LockauditConfig::default();
        config.advisory.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("advisory.batch_size"));
    }

    #[test]
    fn validate_rejects_oversized_batch() {
        let mut config = LockauditConfig::default();
        config.advisory.batch_size = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_depth() {
        let mut config = LockauditConfig::default();
        config.registry.max_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("registry.max_depth"));
    }

    #[test]
    fn validate_rejects_unknown_severity() {
        let mut config = LockauditConfig::default();
        config.audit.severities = vec!["high".to_owned(), "severe".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("severe"));
    }

    #[test]
    fn validate_rejects_zero_file_size() {
        let mut config = LockauditConfig::default();
        config.audit.max_file_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_usize_invalid_keeps_original() {
        let mut val = 6usize;
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_LOCKAUDIT_USIZE_BAD", "deep") };
        override_usize(&mut val, "TEST_LOCKAUDIT_USIZE_BAD");
        assert_eq!(val, 6);
        unsafe { std::env::remove_var("TEST_LOCKAUDIT_USIZE_BAD") };
    }

    #[test]
    fn env_override_bool_accepts_yes() {
        let mut val = false;
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_LOCKAUDIT_BOOL", "yes") };
        override_bool(&mut val, "TEST_LOCKAUDIT_BOOL");
        assert!(val);
        unsafe { std::env::remove_var("TEST_LOCKAUDIT_BOOL") };
    }

    #[test]
    fn env_override_csv_drops_empty_items() {
        let mut val = Vec::new();
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_LOCKAUDIT_CSV", "high, ,critical,") };
        override_csv(&mut val, "TEST_LOCKAUDIT_CSV");
        assert_eq!(val, vec!["high", "critical"]);
        unsafe { std::env::remove_var("TEST_LOCKAUDIT_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOCKAUDIT_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LockauditConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = LockauditConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.advisory.batch_size, config.advisory.batch_size);
        assert_eq!(parsed.registry.path, config.registry.path);
    }
}
