//! Local filesystem storage provider.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::provider::{ByteStream, StorageProvider};
use archiva_common::{Error, RelativePath, Result};

/// Well-known uploads folder used when no base directory is configured.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Local filesystem storage provider.
///
/// Stores files under a configured base directory, defaulting to an
/// `uploads` folder below the process working directory.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider rooted at `root`.
    ///
    /// The root directory is created if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Create a provider rooted at the default uploads folder.
    pub fn with_default_root() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::new(cwd.join(DEFAULT_UPLOADS_DIR))
    }

    /// Base directory this provider writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a relative path to a filesystem path.
    fn to_fs_path(&self, path: &RelativePath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    async fn collect_files(
        &self,
        dir: &RelativePath,
        recursive: bool,
        files: &mut Vec<RelativePath>,
    ) -> Result<()> {
        let fs_path = self.to_fs_path(dir);

        let mut entries = match fs::read_dir(&fs_path).await {
            Ok(entries) => entries,
            // A directory that does not exist yet is an empty listing.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut subdirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let child = dir.join(name)?;

            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                files.push(child);
            } else if file_type.is_dir() && recursive {
                subdirs.push(child);
            }
        }

        for subdir in subdirs {
            Box::pin(self.collect_files(&subdir, recursive, files)).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, path: &RelativePath, data: Vec<u8>) -> Result<RelativePath> {
        let fs_path = self.to_fs_path(path);

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&fs_path, &data).await?;
        Ok(path.clone())
    }

    async fn upload_stream(&self, path: &RelativePath, mut stream: ByteStream) -> Result<RelativePath> {
        let fs_path = self.to_fs_path(path);

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&fs_path).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(path.clone())
    }

    async fn download(&self, path: &RelativePath) -> Result<Vec<u8>> {
        let fs_path = self.to_fs_path(path);

        match fs::read(&fs_path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File not found: {}", path)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, path: &RelativePath) -> Result<()> {
        let fs_path = self.to_fs_path(path);

        match fs::remove_file(&fs_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File not found: {}", path)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>> {
        let mut files = Vec::new();
        self.collect_files(path, recursive, &mut files).await?;
        Ok(files)
    }

    async fn exists(&self, path: &RelativePath) -> bool {
        fs::try_exists(self.to_fs_path(path)).await.unwrap_or(false)
    }
}
