use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;

/// Blob storage seam for avatar assets. Object names are bare filenames;
/// anything containing a path separator is rejected before touching disk.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn delete_object(&self, name: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create upload dir {}", self.root.display()))
    }

    fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !name.is_empty() && !name.contains('/') && !name.contains('\\'),
            "invalid object name {name:?}"
        );
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write object {}", path.display()))
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("delete object {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage
            .put_object("avatar-test.jpg", Bytes::from_static(b"jpeg-bytes"))
            .await
            .expect("put should succeed");
        let on_disk = std::fs::read(dir.path().join("avatar-test.jpg")).unwrap();
        assert_eq!(on_disk, b"jpeg-bytes");

        storage
            .delete_object("avatar-test.jpg")
            .await
            .expect("delete should succeed");
        assert!(!dir.path().join("avatar-test.jpg").exists());
    }

    #[tokio::test]
    async fn delete_missing_object_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.delete_object("nope.jpg").await.is_err());
    }

    #[tokio::test]
    async fn rejects_names_with_separators() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let body = Bytes::from_static(b"x");
        assert!(storage.put_object("../escape.jpg", body.clone()).await.is_err());
        assert!(storage.put_object("a/b.jpg", body.clone()).await.is_err());
        assert!(storage.put_object("", body).await.is_err());
    }

    #[tokio::test]
    async fn ensure_root_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("avatars");
        let storage = LocalStorage::new(&nested);
        storage.ensure_root().await.expect("create nested dirs");
        assert!(nested.is_dir());
    }
}
