//! 외부 협력자 계약 -- advisory 소스와 레지스트리 소스
//!
//! 감사 코어는 네트워크를 모릅니다. 취약점 레코드와 패키지 메타데이터는
//! 이 모듈의 트레이트를 구현한 소스에서 동기적으로 받아옵니다.
//! 호출 하나는 원자적이며 코어는 재시도하지 않습니다.
//!
//! 기본 구현은 로컬 파일 기반의 [`AdvisoryDb`](crate::vuln::AdvisoryDb)와
//! [`FsRegistry`](crate::registry::FsRegistry)입니다.

use std::collections::{BTreeMap, HashMap};

use lockaudit_core::types::Ecosystem;

use crate::error::AuditError;
use crate::types::PackageKey;
use crate::vuln::VulnerabilityRecord;

/// advisory 소스의 기본 배치 크기 (osv.dev `querybatch` 상한)
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// 소스 조회 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// 요청한 패키지가 소스에 없음
    #[error("not found: {0}")]
    NotFound(String),

    /// 전송 계층 실패
    #[error("network error: {0}")]
    Network(String),

    /// 소스가 요청을 제한함
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 소스가 해석할 수 없는 응답을 반환함
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<SourceError> for AuditError {
    fn from(err: SourceError) -> Self {
        AuditError::SourceUnavailable(err.to_string())
    }
}

/// 배치 조회 결과. 취약점이 없는 키는 빠질 수 있습니다.
pub type AdvisoryMap = HashMap<PackageKey, Vec<VulnerabilityRecord>>;

/// 취약점 advisory 소스
pub trait AdvisorySource: Send + Sync {
    /// 한 번의 `batch_lookup`에 넣을 수 있는 최대 키 수
    fn max_batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// `keys` 각각에 대해 해당 버전에 영향을 줄 수 있는 레코드를 조회합니다.
    ///
    /// 반환된 레코드는 호출자가 버전 범위로 다시 판정합니다.
    fn batch_lookup(
        &self,
        ecosystem: Ecosystem,
        keys: &[PackageKey],
    ) -> Result<AdvisoryMap, SourceError>;
}

/// 패키지 레지스트리 소스
pub trait RegistrySource: Send + Sync {
    /// 패키지 메타데이터를 가져옵니다.
    ///
    /// `version`이 주어지면 소스는 해당 버전만 담아 반환해도 됩니다.
    fn fetch_metadata(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PackageMetadata, SourceError>;
}

/// 레지스트리 패키지 문서
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    /// `latest` dist-tag
    pub latest: Option<String>,
    /// 버전별 메타데이터
    pub versions: BTreeMap<String, VersionMetadata>,
}

impl PackageMetadata {
    /// 게시된 버전 문자열을 순회합니다.
    pub fn version_strings(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}

/// 게시된 버전 하나의 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMetadata {
    pub version: String,
    pub integrity: Option<String>,
    /// `(name, range)` 선언 순서
    pub dependencies: Vec<(String, String)>,
    pub optional_dependencies: Vec<(String, String)>,
    pub dev_dependencies: Vec<(String, String)>,
    /// deprecated 메시지
    pub deprecated: Option<String>,
}
