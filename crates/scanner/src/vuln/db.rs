//! advisory 데이터베이스 -- 로컬 OSV JSON 로딩 및 조회
//!
//! [`AdvisoryDb`]는 로컬 파일시스템의 OSV 형식 JSON에서 레코드를 로드하고
//! [`AdvisorySource`]를 구현합니다.
//!
//! # DB 디렉토리 구조
//!
//! ```text
//! /var/lib/lockaudit/advisories/
//!   npm.json       # npm 생태계 OSV 레코드 배열
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use lockaudit_core::types::Ecosystem;

use super::{VulnerabilityRecord, osv};
use crate::error::AuditError;
use crate::source::{AdvisoryMap, AdvisorySource, SourceError};
use crate::types::PackageKey;

/// advisory DB 파일 최대 크기 (50 MB)
const MAX_ADVISORY_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 전체 레코드 최대 개수 (1,000,000개)
const MAX_ADVISORY_RECORDS: usize = 1_000_000;

/// 생태계별 DB 파일 이름
const ECOSYSTEM_FILES: [(&str, Ecosystem); 1] = [("npm.json", Ecosystem::Npm)];

/// advisory 데이터베이스
///
/// `(ecosystem, package)` 쌍으로 인덱싱된 HashMap으로 O(1) 조회합니다.
/// 레코드 하나가 여러 패키지에 영향을 주면 각 패키지 인덱스에 모두 등록됩니다.
#[derive(Debug, Default)]
pub struct AdvisoryDb {
    records: Vec<VulnerabilityRecord>,
    index: HashMap<(Ecosystem, String), Vec<usize>>,
}

impl AdvisoryDb {
    fn build_index(records: &[VulnerabilityRecord]) -> HashMap<(Ecosystem, String), Vec<usize>> {
        let mut index: HashMap<(Ecosystem, String), Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            for affected in &record.affected {
                let slot = index
                    .entry((affected.ecosystem, affected.package.clone()))
                    .or_default();
                if slot.last() != Some(&idx) {
                    slot.push(idx);
                }
            }
        }
        index
    }

    /// 레코드 목록으로 데이터베이스를 생성합니다.
    pub fn from_records(records: Vec<VulnerabilityRecord>) -> Self {
        let index = Self::build_index(&records);
        Self { records, index }
    }

    /// OSV JSON 문자열에서 데이터베이스를 생성합니다.
    pub fn from_osv_json(json: &str) -> Result<Self, AuditError> {
        Ok(Self::from_records(osv::parse_document(json)?))
    }

    /// 디렉토리에서 생태계별 DB 파일을 로드합니다.
    ///
    /// 디렉토리나 DB 파일이 없으면 `AdvisoryDbLoad`로 실패합니다.
    ///
    /// # 보안 제한
    ///
    /// - 파일당 최대 50MB (`MAX_ADVISORY_FILE_SIZE`)
    /// - 전체 레코드 최대 1,000,000개 (`MAX_ADVISORY_RECORDS`), 초과 시 실패
    ///
    /// # Note
    ///
    /// 동기 I/O를 수행합니다. async 컨텍스트에서는
    /// `tokio::task::spawn_blocking`으로 감싸세요.
    pub fn load_from_dir(dir: &Path) -> Result<Self, AuditError> {
        Self::load_with_limit(dir, MAX_ADVISORY_RECORDS)
    }

    fn load_with_limit(dir: &Path, max_records: usize) -> Result<Self, AuditError> {
        if !dir.is_dir() {
            return Err(AuditError::AdvisoryDbLoad {
                path: dir.display().to_string(),
                reason: "advisory db directory not found".to_owned(),
            });
        }

        let mut all_records = Vec::new();

        for (filename, ecosystem) in &ECOSYSTEM_FILES {
            let path = dir.join(filename);

            let metadata = std::fs::metadata(&path).map_err(|e| AuditError::AdvisoryDbLoad {
                path: path.display().to_string(),
                reason: if e.kind() == std::io::ErrorKind::NotFound {
                    "advisory db file not found".to_owned()
                } else {
                    e.to_string()
                },
            })?;

            if metadata.len() > MAX_ADVISORY_FILE_SIZE {
                return Err(AuditError::AdvisoryDbLoad {
                    path: path.display().to_string(),
                    reason: format!(
                        "file size {} bytes exceeds maximum {} bytes",
                        metadata.len(),
                        MAX_ADVISORY_FILE_SIZE
                    ),
                });
            }

            let content =
                std::fs::read_to_string(&path).map_err(|e| AuditError::AdvisoryDbLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            let records = osv::parse_document(&content).map_err(|e| {
                AuditError::AdvisoryDbParse(format!("{}: {e}", path.display()))
            })?;

            let total = all_records.len() + records.len();
            if total > max_records {
                return Err(AuditError::AdvisoryDbLoad {
                    path: path.display().to_string(),
                    reason: format!("{total} records exceed maximum {max_records}"),
                });
            }

            info!(
                path = %path.display(),
                ecosystem = %ecosystem,
                records = records.len(),
                "loaded advisory db file"
            );
            all_records.extend(records);
        }

        Ok(Self::from_records(all_records))
    }

    /// 전체 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 레코드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 생태계와 패키지 이름으로 레코드를 조회합니다.
    pub fn lookup(&self, ecosystem: Ecosystem, package: &str) -> Vec<&VulnerabilityRecord> {
        self.index
            .get(&(ecosystem, package.to_owned()))
            .map(|indices| indices.iter().filter_map(|&i| self.records.get(i)).collect())
            .unwrap_or_default()
    }

    /// 전체 레코드
    pub fn records(&self) -> &[VulnerabilityRecord] {
        &self.records
    }
}

impl AdvisorySource for AdvisoryDb {
    /// 패키지 이름으로 후보 레코드를 돌려줍니다. 버전 판정은 매처가 합니다.
    fn batch_lookup(
        &self,
        ecosystem: Ecosystem,
        keys: &[PackageKey],
    ) -> Result<AdvisoryMap, SourceError> {
        let mut results = AdvisoryMap::new();
        for key in keys {
            let records = self.lookup(ecosystem, &key.name);
            if !records.is_empty() {
                results.insert(key.clone(), records.into_iter().cloned().collect());
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vuln::AffectedRange;

    fn record(id: &str, packages: &[&str]) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: id.to_owned(),
            aliases: Vec::new(),
            summary: None,
            affected: packages
                .iter()
                .map(|p| AffectedRange {
                    ecosystem: Ecosystem::Npm,
                    package: (*p).to_owned(),
                    range: "*".to_owned(),
                    fixed: None,
                })
                .collect(),
            cvss_vectors: Vec::new(),
        }
    }

    const OSV: &str = r#"[
      {"id": "GHSA-1", "affected": [{"package": {"ecosystem": "npm", "name": "lodash"},
        "ranges": [{"type": "SEMVER", "events": [{"introduced": "0"}, {"fixed": "4.17.21"}]}]}]},
      {"id": "GHSA-2", "affected": [{"package": {"ecosystem": "npm", "name": "minimist"},
        "versions": ["1.2.0"]}]}
    ]"#;

    #[test]
    fn empty_db() {
        let db = AdvisoryDb::from_records(Vec::new());
        assert!(db.is_empty());
        assert!(db.lookup(Ecosystem::Npm, "anything").is_empty());
    }

    #[test]
    fn lookup_by_package() {
        let db = AdvisoryDb::from_osv_json(OSV).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.lookup(Ecosystem::Npm, "lodash")[0].id, "GHSA-1");
        assert_eq!(db.lookup(Ecosystem::Npm, "minimist")[0].id, "GHSA-2");
        assert!(db.lookup(Ecosystem::Npm, "express").is_empty());
    }

    #[test]
    fn record_indexed_once_per_package() {
        let mut rec = record("GHSA-1", &["a", "b"]);
        rec.affected.push(rec.affected[0].clone());
        let db = AdvisoryDb::from_records(vec![rec, record("GHSA-2", &["a"])]);
        assert_eq!(db.lookup(Ecosystem::Npm, "a").len(), 2);
        assert_eq!(db.lookup(Ecosystem::Npm, "b").len(), 1);
    }

    #[test]
    fn batch_lookup_omits_clean_keys() {
        let db = AdvisoryDb::from_osv_json(OSV).unwrap();
        let keys = vec![
            PackageKey::new("lodash", "4.17.0"),
            PackageKey::new("lodash", "4.17.21"),
            PackageKey::new("express", "4.18.2"),
        ];
        let results = db.batch_lookup(Ecosystem::Npm, &keys).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results.contains_key(&keys[2]));
        assert_eq!(db.max_batch_size(), 1000);
    }

    #[test]
    fn from_osv_json_invalid() {
        let err = AdvisoryDb::from_osv_json("not json").unwrap_err();
        assert!(matches!(err, AuditError::AdvisoryDbParse(_)));
    }

    #[test]
    fn load_from_dir_missing_npm_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        match AdvisoryDb::load_from_dir(dir.path()) {
            Err(AuditError::AdvisoryDbLoad { path, reason }) => {
                assert!(path.ends_with("npm.json"));
                assert!(reason.contains("not found"));
            }
            other => panic!("expected AdvisoryDbLoad, got {other:?}"),
        }
    }

    #[test]
    fn load_from_dir_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = AdvisoryDb::load_from_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, AuditError::AdvisoryDbLoad { .. }));
        assert!(err.to_string().contains("directory not found"));
    }

    #[test]
    fn load_over_record_limit_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("npm.json"), OSV).unwrap();

        let err = AdvisoryDb::load_with_limit(dir.path(), 1).unwrap_err();
        assert!(matches!(err, AuditError::AdvisoryDbLoad { .. }));
        assert!(err.to_string().contains("2 records exceed maximum 1"));

        assert_eq!(AdvisoryDb::load_with_limit(dir.path(), 2).unwrap().len(), 2);
    }

    #[test]
    fn load_from_dir_reads_npm_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("npm.json"), OSV).unwrap();
        let db = AdvisoryDb::load_from_dir(dir.path()).unwrap();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn load_from_dir_invalid_json_names_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("npm.json"), "[{").unwrap();
        match AdvisoryDb::load_from_dir(dir.path()) {
            Err(AuditError::AdvisoryDbParse(msg)) => assert!(msg.contains("npm.json")),
            other => panic!("expected AdvisoryDbParse, got {other:?}"),
        }
    }

    #[test]
    fn load_from_dir_unreadable_path_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("npm.json")).unwrap();
        let err = AdvisoryDb::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AuditError::AdvisoryDbLoad { .. }));
    }
}
