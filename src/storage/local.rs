//! Local directory store with `file://` references.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use super::{ObjectStore, PutOptions, StoredObject};
use crate::auth::Credential;
use crate::types::{FlowError, Result};

#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: &Path) -> Result<Self> {
        let root = std::path::absolute(root)?;
        Ok(Self { root })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if name.is_empty() || escapes {
            return Err(FlowError::validation("name", format!("invalid object name: {}", name)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        _options: &PutOptions,
        _credential: &Credential,
    ) -> Result<StoredObject> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored object on disk");

        let url = Url::from_file_path(&path)
            .map_err(|_| FlowError::Config(format!("Cannot build file URL for {}", path.display())))?;
        Ok(StoredObject { url: url.to_string() })
    }

    async fn delete(&self, url: &str, _credential: &Credential) -> Result<()> {
        let path = Url::parse(url)
            .ok()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .filter(|p| p.starts_with(&self.root))
            .ok_or_else(|| {
                FlowError::validation("url", format!("not an object of this store: {}", url))
            })?;

        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> PutOptions {
        PutOptions {
            public: true,
            content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_then_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(dir.path()).unwrap();
        let cred = Credential::bearer("t").unwrap();

        let stored = store.put("uploads/a.png", b"png", &options(), &cred).await.unwrap();
        assert!(stored.url.starts_with("file://"));

        let path = dir.path().join("uploads/a.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png");

        store.delete(&stored.url, &cred).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(dir.path()).unwrap();
        let cred = Credential::bearer("t").unwrap();

        let result = store.put("../outside.png", b"x", &options(), &cred).await;
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_outside_root_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(&dir.path().join("objects")).unwrap();
        let cred = Credential::bearer("t").unwrap();

        let result = store.delete("https://cdn.test/a.png", &cred).await;
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }
}
