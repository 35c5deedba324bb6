use crate::domain::ports::ArtifactStore;
use crate::utils::error::{LoadError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// 本機檔案系統上的模型檔案來源。相對路徑以 `base_path` 為根。
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        // 絕對路徑時 join 會直接取代 base_path
        self.base_path.join(path)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ArtifactStore for LocalStorage {
    async fn read_artifact(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        tracing::debug!("Reading artifact {}", full_path.display());

        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LoadError::NotFound {
                path: display(&full_path),
            }
            .into()),
            Err(e) => Err(LoadError::Unreadable {
                path: display(&full_path),
                source: e,
            }
            .into()),
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::InferenceError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_relative_and_absolute_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("xgb.json"), b"{}").unwrap();

        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.read_artifact("xgb.json").await.unwrap(), b"{}");

        let absolute = dir.path().join("xgb.json");
        let other = LocalStorage::new("/nonexistent-base");
        assert_eq!(
            other
                .read_artifact(absolute.to_str().unwrap())
                .await
                .unwrap(),
            b"{}"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = storage.read_artifact("missing.json").await.unwrap_err();
        assert!(matches!(err, InferenceError::Load(LoadError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_directory_is_unreadable() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("model.json")).unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = storage.read_artifact("model.json").await.unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Load(LoadError::Unreadable { .. })
        ));
    }
}
