//! JSON 설정 파일 읽기
//!
//! 설정은 사용자가 직접 작성하고, handoff 는 읽기만 함

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 프로젝트 설정 디렉토리 이름 (`<root>/.handoff`)
const PROJECT_DIR_NAME: &str = ".handoff";

/// 디렉토리 하나에 대응하는 JSON 설정 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<root>/.handoff/`
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(PROJECT_DIR_NAME))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// JSON 로드. 파일이 없거나 파싱 실패 시 `Error::Config`
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        let path = self.file_path(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        debug!("Loaded {}", path.display());
        Ok(value)
    }

    /// 파일이 없으면 `None`
    pub fn load_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        if !self.file_path(filename).exists() {
            return Ok(None);
        }
        self.load(filename).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());
        std::fs::create_dir_all(store.base_dir()).unwrap();
        std::fs::write(
            store.file_path("sample.json"),
            r#"{ "name": "worker", "count": 3 }"#,
        )
        .unwrap();

        assert!(store.base_dir().ends_with(".handoff"));
        assert_eq!(
            store.load::<Sample>("sample.json").unwrap(),
            Sample {
                name: "worker".to_string(),
                count: 3,
            }
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        assert!(store.load_optional::<Sample>("absent.json").unwrap().is_none());
        assert!(matches!(
            store.load::<Sample>("absent.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(store.file_path("broken.json"), "{ not json").unwrap();

        assert!(matches!(
            store.load_optional::<Sample>("broken.json"),
            Err(Error::Config(_))
        ));
    }
}
