//! lockaudit 공통 크레이트
//!
//! 스캐너와 CLI가 함께 사용하는 심각도/생태계 타입, 최상위 에러,
//! `lockaudit.toml` 설정을 정의합니다.

pub mod config;
pub mod error;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AuditFailure, ConfigError, LockauditError};

// 설정
pub use config::LockauditConfig;

// 도메인 타입
pub use types::{Ecosystem, Severity};
