//! 감사 설정
//!
//! [`AuditConfig`]는 core의 [`LockauditConfig`](lockaudit_core::config::LockauditConfig)에서
//! 파생되며, 감사 한 번에 필요한 소스 경로, 배치 크기, 필터, 입력 제한을 담습니다.
//!
//! # 사용 예시
//!
//! ```
//! use lockaudit_core::Severity;
//! use lockaudit_scanner::AuditConfigBuilder;
//!
//! let config = AuditConfigBuilder::new()
//!     .severities([Severity::High, Severity::Critical])
//!     .local_only(true)
//!     .build()
//!     .unwrap();
//! assert!(config.filter().local_only);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use lockaudit_core::config::{LockauditConfig, MAX_ADVISORY_BATCH_SIZE};
use lockaudit_core::types::Severity;

use crate::error::AuditError;
use crate::vuln::AuditFilter;

/// 설정 상한값 상수
const MAX_DEPTH_LIMIT: usize = 64;
const MAX_FILE_SIZE_LIMIT: usize = 512 * 1024 * 1024; // 512 MB
const MAX_PATH_LEN: usize = 4096;

/// 감사 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// advisory DB 디렉토리
    pub advisory_db_path: String,
    /// 레지스트리 문서 디렉토리
    pub registry_path: String,
    /// advisory 배치 크기 (소스 상한과 작은 쪽을 사용)
    pub batch_size: usize,
    /// 레지스트리 기반 감사의 최대 깊이
    pub max_depth: usize,
    /// 허용 심각도 집합. `None`이면 전부 허용
    pub severities: Option<BTreeSet<Severity>>,
    /// 네트워크 공격 벡터 advisory 제외
    pub local_only: bool,
    /// lockfile 최대 크기 (바이트)
    pub max_file_size: usize,
    /// 표준 입력 최대 크기 (바이트)
    pub max_stdin_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            advisory_db_path: "/var/lib/lockaudit/advisories".to_owned(),
            registry_path: "/var/lib/lockaudit/registry".to_owned(),
            batch_size: MAX_ADVISORY_BATCH_SIZE,
            max_depth: 6,
            severities: None,
            local_only: false,
            max_file_size: 100 * 1024 * 1024, // 100 MB
            max_stdin_size: 50 * 1024 * 1024, // 50 MB
        }
    }
}

impl AuditConfig {
    /// core 설정에서 감사 설정을 생성합니다.
    ///
    /// 알 수 없는 심각도 이름은 경고 후 무시합니다. 빈 목록은 필터 없음입니다.
    pub fn from_core(core: &LockauditConfig) -> Self {
        Self {
            advisory_db_path: core.advisory.db_path.clone(),
            registry_path: core.registry.path.clone(),
            batch_size: core.advisory.batch_size,
            max_depth: core.registry.max_depth,
            severities: parse_severities(&core.audit.severities),
            local_only: core.audit.local_only,
            max_file_size: core.audit.max_file_size,
            max_stdin_size: core.audit.max_stdin_size,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `batch_size`: 1-1000
    /// - `max_depth`: 1-64
    /// - `max_file_size`, `max_stdin_size`: 1-536870912 (512MB)
    /// - 경로: 비어 있지 않고 4096자 이하
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.batch_size == 0 || self.batch_size > MAX_ADVISORY_BATCH_SIZE {
            return Err(config_error(
                "batch_size",
                format!("must be 1-{MAX_ADVISORY_BATCH_SIZE}"),
            ));
        }

        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_LIMIT {
            return Err(config_error("max_depth", format!("must be 1-{MAX_DEPTH_LIMIT}")));
        }

        for (field, value) in [
            ("max_file_size", self.max_file_size),
            ("max_stdin_size", self.max_stdin_size),
        ] {
            if value == 0 || value > MAX_FILE_SIZE_LIMIT {
                return Err(config_error(field, format!("must be 1-{MAX_FILE_SIZE_LIMIT}")));
            }
        }

        for (field, path) in [
            ("advisory_db_path", &self.advisory_db_path),
            ("registry_path", &self.registry_path),
        ] {
            if path.is_empty() {
                return Err(config_error(field, "must not be empty".to_owned()));
            }
            if path.len() > MAX_PATH_LEN {
                return Err(config_error(
                    field,
                    format!("path exceeds maximum length {MAX_PATH_LEN}"),
                ));
            }
        }

        Ok(())
    }

    /// 심각도/로컬 전용 필터
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            severities: self.severities.clone(),
            local_only: self.local_only,
        }
    }
}

fn config_error(field: &str, reason: String) -> AuditError {
    AuditError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// 심각도 이름 목록을 집합으로 바꿉니다.
pub fn parse_severities<S: AsRef<str>>(names: &[S]) -> Option<BTreeSet<Severity>> {
    let set: BTreeSet<Severity> = names
        .iter()
        .filter_map(|name| {
            let parsed = Severity::from_str_loose(name.as_ref());
            if parsed.is_none() {
                warn!(severity = name.as_ref(), "ignoring unknown severity name");
            }
            parsed
        })
        .collect();
    (!set.is_empty()).then_some(set)
}

/// 감사 설정 빌더
#[derive(Debug, Default)]
pub struct AuditConfigBuilder {
    config: AuditConfig,
}

impl AuditConfigBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기존 설정에서 시작합니다.
    pub fn from_config(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn advisory_db_path(mut self, path: impl Into<String>) -> Self {
        self.config.advisory_db_path = path.into();
        self
    }

    pub fn registry_path(mut self, path: impl Into<String>) -> Self {
        self.config.registry_path = path.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// 허용 심각도를 설정합니다. 빈 목록은 필터 없음입니다.
    pub fn severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        let set: BTreeSet<Severity> = severities.into_iter().collect();
        self.config.severities = (!set.is_empty()).then_some(set);
        self
    }

    pub fn local_only(mut self, local_only: bool) -> Self {
        self.config.local_only = local_only;
        self
    }

    pub fn max_file_size(mut self, size: usize) -> Self {
        self.config.max_file_size = size;
        self
    }

    pub fn max_stdin_size(mut self, size: usize) -> Self {
        self.config.max_stdin_size = size;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<AuditConfig, AuditError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AuditConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_depth, 6);
        assert!(config.severities.is_none());
    }

    #[test]
    fn from_core_copies_sections() {
        let mut core = LockauditConfig::default();
        core.advisory.db_path = "/srv/osv".to_owned();
        core.advisory.batch_size = 250;
        core.registry.max_depth = 3;
        core.audit.severities = vec!["high".to_owned(), "CRITICAL".to_owned()];
        core.audit.local_only = true;

        let config = AuditConfig::from_core(&core);
        assert_eq!(config.advisory_db_path, "/srv/osv");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.max_depth, 3);
        assert!(config.local_only);
        assert_eq!(
            config.severities,
            Some([Severity::High, Severity::Critical].into_iter().collect())
        );
    }

    #[test]
    fn default_core_config_matches_defaults() {
        assert_eq!(AuditConfig::from_core(&LockauditConfig::default()), AuditConfig::default());
    }

    #[test]
    fn unknown_severity_names_are_dropped() {
        assert_eq!(
            parse_severities(&["high", "severe"]),
            Some([Severity::High].into_iter().collect())
        );
        assert_eq!(parse_severities::<&str>(&[]), None);
        assert_eq!(parse_severities(&["severe"]), None);
    }

    #[test]
    fn builder_rejects_zero_batch() {
        let err = AuditConfigBuilder::new().batch_size(0).build().unwrap_err();
        assert!(matches!(err, AuditError::Config { ref field, .. } if field == "batch_size"));
    }

    #[test]
    fn builder_rejects_batch_over_source_limit() {
        assert!(AuditConfigBuilder::new().batch_size(1001).build().is_err());
        assert!(AuditConfigBuilder::new().batch_size(1000).build().is_ok());
    }

    #[test]
    fn builder_rejects_depth_out_of_range() {
        assert!(AuditConfigBuilder::new().max_depth(0).build().is_err());
        assert!(AuditConfigBuilder::new().max_depth(65).build().is_err());
    }

    #[test]
    fn builder_rejects_empty_paths() {
        let err = AuditConfigBuilder::new().registry_path("").build().unwrap_err();
        assert!(matches!(err, AuditError::Config { ref field, .. } if field == "registry_path"));
    }

    #[test]
    fn builder_rejects_oversized_limits() {
        assert!(AuditConfigBuilder::new().max_stdin_size(0).build().is_err());
        assert!(
            AuditConfigBuilder::new()
                .max_file_size(MAX_FILE_SIZE_LIMIT + 1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn empty_severity_list_means_no_filter() {
        let config = AuditConfigBuilder::new().severities([]).build().unwrap();
        assert!(config.filter().severities.is_none());
    }
}
