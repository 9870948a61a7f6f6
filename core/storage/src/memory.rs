//! In-memory storage provider for testing.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::provider::{ByteStream, StorageProvider};
use archiva_common::{Error, RelativePath, Result};

/// In-memory storage provider.
///
/// Useful for testing and development. Directories are implicit; only file
/// contents are stored, keyed by their relative path. All data is lost on
/// drop.
#[derive(Default)]
pub struct MemoryProvider {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.read().unwrap().len()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(&self, path: &RelativePath, data: Vec<u8>) -> Result<RelativePath> {
        if path.is_root() {
            return Err(Error::InvalidInput("Cannot upload to the root".to_string()));
        }
        self.files
            .write()
            .unwrap()
            .insert(path.as_str_path(), data);
        Ok(path.clone())
    }

    async fn upload_stream(&self, path: &RelativePath, mut stream: ByteStream) -> Result<RelativePath> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        self.upload(path, data).await
    }

    async fn download(&self, path: &RelativePath) -> Result<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(&path.as_str_path())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    async fn delete(&self, path: &RelativePath) -> Result<()> {
        self.files
            .write()
            .unwrap()
            .remove(&path.as_str_path())
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    async fn list(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>> {
        let prefix = path.as_str_path();
        let files = self.files.read().unwrap();

        let mut result = Vec::new();
        for key in files.keys() {
            let remainder = if prefix.is_empty() {
                key.as_str()
            } else if let Some(rest) = key.strip_prefix(&format!("{}/", prefix)) {
                rest
            } else {
                continue;
            };

            if recursive || !remainder.contains('/') {
                result.push(RelativePath::parse(key)?);
            }
        }
        Ok(result)
    }

    async fn exists(&self, path: &RelativePath) -> bool {
        let key = path.as_str_path();
        let files = self.files.read().unwrap();
        files.contains_key(&key)
            || files
                .keys()
                .any(|k| k.starts_with(&format!("{}/", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> RelativePath {
        RelativePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let provider = MemoryProvider::new();
        provider.upload(&path("a.txt"), b"data".to_vec()).await.unwrap();
        assert_eq!(provider.download(&path("a.txt")).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let provider = MemoryProvider::new();
        assert!(provider.download(&path("x")).await.unwrap_err().is_not_found());
        assert!(provider.delete(&path("x")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_modes() {
        let provider = MemoryProvider::new();
        provider.upload(&path("a.txt"), vec![1]).await.unwrap();
        provider.upload(&path("sub/b.txt"), vec![2]).await.unwrap();

        let flat = provider.list(&RelativePath::root(), false).await.unwrap();
        assert_eq!(flat, vec![path("a.txt")]);

        let deep = provider.list(&RelativePath::root(), true).await.unwrap();
        assert_eq!(deep, vec![path("a.txt"), path("sub/b.txt")]);

        let scoped = provider.list(&path("sub"), false).await.unwrap();
        assert_eq!(scoped, vec![path("sub/b.txt")]);
    }

    #[tokio::test]
    async fn test_exists_covers_implicit_directories() {
        let provider = MemoryProvider::new();
        provider.upload(&path("sub/b.txt"), vec![2]).await.unwrap();

        assert!(provider.exists(&path("sub/b.txt")).await);
        assert!(provider.exists(&path("sub")).await);
        assert!(!provider.exists(&path("other")).await);
    }
}
