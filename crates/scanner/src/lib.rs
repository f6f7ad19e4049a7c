#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 타입 (`AuditError`)
//! - [`config`]: 감사 설정 (`AuditConfig`, 빌더)
//! - [`types`]: 도메인 타입 (`LockfileFormat`, `PackageKey`)
//! - [`graph`]: 의존성 그래프 (`DependencyGraph`, `GraphBuilder`, 최단 경로)
//! - [`parser`]: lockfile 파서 (`LockfileParser` trait, npm/yarn/pnpm)
//! - [`cvss`]: CVSS v2/v3 기본 점수 계산 (`Assessment`)
//! - [`vuln`]: 버전 범위, advisory DB, 매칭, 결과 (`AdvisoryDb`, `VulnMatcher`, `AuditResult`)
//! - [`source`]: 외부 소스 계약 (`AdvisorySource`, `RegistrySource`)
//! - [`registry`]: 레지스트리 기반 패키지 그래프 (`FsRegistry`)
//! - [`auditor`]: 감사 오케스트레이터 (`Auditor`)
//!
//! # 아키텍처
//!
//! ```text
//! package-lock.json --+
//! yarn.lock ----------+--> LockfileParser --> DependencyGraph --> Auditor
//! pnpm-lock.yaml -----+                            ^                 |
//!                                                  |          AdvisorySource (batch)
//! RegistrySource --> build_registry_graph ---------+                 |
//!                                                            VulnMatcher + CVSS
//!                                                                    |
//!                                                              AuditResult
//! ```

pub mod auditor;
pub mod config;
pub mod cvss;
pub mod error;
pub mod graph;
pub mod parser;
pub mod registry;
pub mod source;
pub mod types;
pub mod vuln;

// --- Public API Re-exports ---

// Orchestrator
pub use auditor::Auditor;

// Configuration
pub use config::{AuditConfig, AuditConfigBuilder};

// Error
pub use error::AuditError;

// Types
pub use types::{LockfileFormat, PackageKey};

// Graph
pub use graph::{DependencyGraph, GraphBuilder, NodeId, PackageNode};

// Parser
pub use parser::{LockfileParser, NpmLockParser, PnpmLockParser, YarnLockParser, parse_lockfile};

// Scoring
pub use cvss::{Assessment, Score, ScoreError};

// Sources
pub use registry::{FsRegistry, RegistryGraph, build_registry_graph};
pub use source::{AdvisorySource, PackageMetadata, RegistrySource, SourceError, VersionMetadata};

// Vulnerability
pub use vuln::{
    AdvisoryDb, AuditFilter, AuditResult, Category, Finding, NpmRange, SeverityCounts,
    VulnMatcher, VulnerabilityRecord,
};
