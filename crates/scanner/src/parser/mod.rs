//! lockfile 파서 -- package-lock.json, yarn.lock, pnpm-lock.yaml
//!
//! [`LockfileParser`] trait은 각 lockfile 형식의 파서가 구현해야 하는 인터페이스입니다.
//! 모든 파서는 [`GraphBuilder`](crate::graph::GraphBuilder)로 같은 형태의
//! [`DependencyGraph`]를 만듭니다.
//!
//! # 지원 형식
//!
//! - `package-lock.json` / `npm-shrinkwrap.json` (v1, v2, v3) -- [`NpmLockParser`]
//! - `yarn.lock` (classic v1, berry) -- [`YarnLockParser`]
//! - `pnpm-lock.yaml` (v5, v6, v9) -- [`PnpmLockParser`]
//!
//! 구조가 잘못된 입력은 위치(줄 번호 또는 섹션)를 담은
//! [`AuditError::LockfileParse`]로 실패하며, 부분 그래프는 반환하지 않습니다.
//! 알 수 없는 필드는 무시합니다.

pub mod npm;
pub mod pnpm;
pub mod yarn;

use std::fmt;
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use tracing::debug;

use crate::error::AuditError;
use crate::graph::DependencyGraph;
use crate::types::LockfileFormat;

pub use npm::NpmLockParser;
pub use pnpm::PnpmLockParser;
pub use yarn::YarnLockParser;

/// Lockfile 파서 trait
pub trait LockfileParser: Send + Sync {
    /// 이 파서가 담당하는 형식
    fn format(&self) -> LockfileFormat;

    /// lockfile 내용을 파싱하여 의존성 그래프를 반환합니다.
    ///
    /// # Arguments
    ///
    /// - `content`: lockfile 내용 (UTF-8 문자열)
    /// - `source`: 그래프 출처 라벨 (경로 또는 `-`)
    fn parse(&self, content: &str, source: &str) -> Result<DependencyGraph, AuditError>;
}

/// 형식 태그에 맞는 파서를 반환합니다.
pub fn parser_for(format: LockfileFormat) -> &'static dyn LockfileParser {
    match format {
        LockfileFormat::Npm => &NpmLockParser,
        LockfileFormat::Yarn => &YarnLockParser,
        LockfileFormat::Pnpm => &PnpmLockParser,
    }
}

/// 형식에 맞는 파서로 lockfile 내용을 파싱합니다.
pub fn parse_lockfile(
    content: &str,
    format: LockfileFormat,
    source: &str,
) -> Result<DependencyGraph, AuditError> {
    let graph = parser_for(format).parse(content, source)?;
    debug!(
        source,
        format = %format,
        packages = graph.len(),
        roots = graph.roots().len(),
        "parsed lockfile"
    );
    Ok(graph)
}

/// 크기 제한을 확인하며 lockfile을 읽습니다.
///
/// # Note
///
/// 동기 I/O를 수행합니다.
pub fn read_lockfile(path: &Path, max_size: usize) -> Result<String, AuditError> {
    let label = path.display().to_string();
    let io_err = |source| AuditError::Io {
        path: label.clone(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(io_err)?;
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > max_size {
        return Err(AuditError::FileTooBig {
            path: label.clone(),
            size,
            max: max_size,
        });
    }

    let file = std::fs::File::open(path).map_err(io_err)?;
    read_to_limit(file, &label, max_size)
}

/// `max_size` 바이트까지 읽습니다 (표준 입력용).
///
/// 초과하면 `FileTooBig`, 공백뿐이면 `EmptyInput`을 반환합니다.
pub fn read_to_limit(reader: impl Read, label: &str, max_size: usize) -> Result<String, AuditError> {
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let mut content = String::new();
    let read = reader
        .take(limit)
        .read_to_string(&mut content)
        .map_err(|source| AuditError::Io {
            path: label.to_owned(),
            source,
        })?;

    if read > max_size {
        return Err(AuditError::FileTooBig {
            path: label.to_owned(),
            size: read,
            max: max_size,
        });
    }
    if content.trim().is_empty() {
        return Err(AuditError::EmptyInput(label.to_owned()));
    }
    Ok(content)
}

/// 선언 순서를 보존하는 맵 (`dependencies` 등)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ordered<V>(pub Vec<(String, V)>);

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Ordered<V> {
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// 문자열로 읽는 YAML 스칼라
///
/// `ms: 1` 처럼 따옴표 없는 숫자 버전도 문자열로 받습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Scalar(pub String);

impl Scalar {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl Visitor<'_> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or number")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Scalar, E> {
                Ok(Scalar(v.to_owned()))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// `npm:real-name@range` 별칭을 `(real-name, range)`로 풉니다.
pub(crate) fn split_npm_alias(spec: &str) -> Option<(&str, &str)> {
    let rest = spec.strip_prefix("npm:")?;
    split_name_at(rest)
}

/// `name@rest`에서 이름 부분의 `@`(스코프 접두사 제외)로 나눕니다.
pub(crate) fn split_name_at(spec: &str) -> Option<(&str, &str)> {
    let search_from = usize::from(spec.starts_with('@'));
    let at = spec[search_from..].find('@')? + search_from;
    Some((&spec[..at], &spec[at + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_for_returns_matching_format() {
        for format in [LockfileFormat::Npm, LockfileFormat::Yarn, LockfileFormat::Pnpm] {
            assert_eq!(parser_for(format).format(), format);
        }
    }

    #[test]
    fn read_to_limit_rejects_oversize() {
        let err = read_to_limit(&b"0123456789"[..], "-", 5).unwrap_err();
        assert!(matches!(err, AuditError::FileTooBig { size: 6, max: 5, .. }));
    }

    #[test]
    fn read_to_limit_accepts_exact_size() {
        assert_eq!(read_to_limit(&b"abcde"[..], "-", 5).unwrap(), "abcde");
    }

    #[test]
    fn read_to_limit_rejects_blank_input() {
        let err = read_to_limit(&b"  \n\t"[..], "-", 100).unwrap_err();
        assert!(matches!(err, AuditError::EmptyInput(ref label) if label == "-"));
    }

    #[test]
    fn read_lockfile_checks_metadata_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package-lock.json");
        std::fs::write(&path, vec![b'x'; 64]).unwrap();
        assert!(matches!(
            read_lockfile(&path, 32),
            Err(AuditError::FileTooBig { size: 64, .. })
        ));
        assert_eq!(read_lockfile(&path, 64).unwrap().len(), 64);
    }

    #[test]
    fn read_lockfile_missing_file_is_io_error() {
        let err = read_lockfile(Path::new("/nonexistent/yarn.lock"), 10).unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[test]
    fn ordered_map_keeps_declaration_order() {
        let map: Ordered<String> =
            serde_json::from_str(r#"{"zeta": "1", "alpha": "2", "mid": "3"}"#).unwrap();
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(map.get("alpha").map(String::as_str), Some("2"));
    }

    #[test]
    fn scalar_accepts_unquoted_numbers() {
        let map: Ordered<Scalar> = serde_yaml::from_str("a: 1\nb: ^2.0.0\nc: 3.5\n").unwrap();
        let values: Vec<_> = map.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["1", "^2.0.0", "3.5"]);
    }

    #[test]
    fn alias_and_scoped_names() {
        assert_eq!(split_npm_alias("npm:string-width@^4.2.0"), Some(("string-width", "^4.2.0")));
        assert_eq!(split_npm_alias("npm:@babel/core@7.0.0"), Some(("@babel/core", "7.0.0")));
        assert_eq!(split_npm_alias("^1.0.0"), None);
        assert_eq!(split_name_at("@types/node@20.1.0"), Some(("@types/node", "20.1.0")));
        assert_eq!(split_name_at("lodash"), None);
    }
}
