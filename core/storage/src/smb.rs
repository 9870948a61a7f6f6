//! SMB storage provider.
//!
//! The native client is abstracted once behind the [`SmbClient`] trait
//! rather than re-wrapped per operation, so the provider logic is uniform
//! and testable without a reachable share. A libsmbclient-backed
//! implementation ships behind the `smb-native` feature.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

use crate::ftp::join_posix;
use crate::provider::{ByteStream, StorageProvider, Testable};
use archiva_common::{Error, RelativePath, Result};

/// Type tag for an SMB directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbEntryKind {
    File,
    Directory,
}

/// A typed directory entry returned by an SMB client.
#[derive(Debug, Clone)]
pub struct SmbDirEntry {
    pub name: String,
    pub kind: SmbEntryKind,
}

/// Uniform awaitable interface over a native SMB client.
///
/// Paths are backslash-separated, share-relative.
#[async_trait]
pub trait SmbClient: Send + Sync {
    /// Create a single directory. An existing directory is
    /// `Error::AlreadyExists`.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Write the full content of a file, replacing it if present.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read the full content of a file. Absent files are `Error::NotFound`.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove a file. Absent files are `Error::NotFound`.
    async fn unlink(&self, path: &str) -> Result<()>;

    /// List the entries of a directory with explicit type tags.
    async fn read_dir(&self, path: &str) -> Result<Vec<SmbDirEntry>>;

    /// Release the underlying connection. Safe to call repeatedly.
    async fn disconnect(&self) -> Result<()>;
}

/// SMB backend configuration.
#[derive(Clone)]
pub struct SmbConfig {
    pub host: String,
    pub port: u16,
    pub share: String,
    pub domain: String,
    pub username: String,
    pub password: String,
    /// Share-relative prefix all relative paths resolve against.
    pub base_path: String,
}

impl SmbConfig {
    /// Default SMB port.
    pub const DEFAULT_PORT: u16 = 445;
}

impl std::fmt::Debug for SmbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("share", &self.share)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// SMB storage provider.
pub struct SmbProvider {
    config: SmbConfig,
    client: Arc<dyn SmbClient>,
}

impl SmbProvider {
    /// Create a provider over an already-constructed client.
    pub fn new(config: SmbConfig, client: Arc<dyn SmbClient>) -> Self {
        Self { config, client }
    }

    /// Translate a relative path into backslash-joined share addressing.
    fn smb_path(&self, path: &RelativePath) -> String {
        join_posix(&self.config.base_path, path).replace('/', "\\")
    }

    /// Create each missing component of the parent chain of `path`,
    /// suppressing only the already-exists condition.
    async fn ensure_parent_dirs(&self, path: &RelativePath) -> Result<()> {
        let parent = path.parent().unwrap_or_else(RelativePath::root);
        let mut current = RelativePath::root();
        for component in parent.components() {
            current = current.join(component)?;
            match self.client.mkdir(&self.smb_path(&current)).await {
                Ok(()) | Err(Error::AlreadyExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn walk(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>> {
        let mut files = Vec::new();
        let mut pending = vec![path.clone()];

        while let Some(dir) = pending.pop() {
            let entries = self.client.read_dir(&self.smb_path(&dir)).await?;
            for entry in entries {
                let child = dir.join(&entry.name)?;
                match entry.kind {
                    SmbEntryKind::File => files.push(child),
                    SmbEntryKind::Directory if recursive => pending.push(child),
                    SmbEntryKind::Directory => {}
                }
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl StorageProvider for SmbProvider {
    fn name(&self) -> &str {
        "smb"
    }

    async fn upload(&self, path: &RelativePath, data: Vec<u8>) -> Result<RelativePath> {
        self.ensure_parent_dirs(path).await?;
        self.client.write_file(&self.smb_path(path), &data).await?;
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
        self.client.read_file(&self.smb_path(path)).await
    }

    /// Deleting a missing file surfaces `Error::NotFound`.
    async fn delete(&self, path: &RelativePath) -> Result<()> {
        self.client.unlink(&self.smb_path(path)).await
    }

    /// Any listing failure is normalized to an empty result so migration
    /// source enumeration stays resilient to partially-unreachable shares.
    /// Callers must not assume an empty list means no files exist.
    async fn list(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>> {
        Ok(self.walk(path, recursive).await.unwrap_or_default())
    }

    async fn exists(&self, path: &RelativePath) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let parent = path.parent().unwrap_or_else(RelativePath::root);
        match self.client.read_dir(&self.smb_path(&parent)).await {
            Ok(entries) => entries.iter().any(|entry| entry.name == name),
            Err(_) => false,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await
    }

    fn as_testable(&self) -> Option<&dyn Testable> {
        Some(self)
    }
}

#[async_trait]
impl Testable for SmbProvider {
    async fn test_connection(&self) -> bool {
        self.client
            .read_dir(&self.smb_path(&RelativePath::root()))
            .await
            .is_ok()
    }
}

/// libsmbclient-backed [`SmbClient`].
#[cfg(feature = "smb-native")]
pub mod native {
    use super::{SmbClient, SmbConfig, SmbDirEntry, SmbEntryKind};
    use archiva_common::{Error, Result};
    use async_trait::async_trait;
    use pavao::{
        SmbClient as PavaoClient, SmbCredentials, SmbDirentType, SmbMode, SmbOpenOptions,
        SmbOptions,
    };
    use std::io::{Read, Write};
    use std::sync::Mutex;

    /// Adapter over `pavao`'s synchronous libsmbclient bindings.
    ///
    /// Calls are short and serialized behind a mutex; libsmbclient contexts
    /// are not thread-safe.
    pub struct NativeSmbClient {
        client: Mutex<PavaoClient>,
    }

    impl NativeSmbClient {
        /// Connect to the share described by `config`.
        pub fn connect(config: &SmbConfig) -> Result<Self> {
            let credentials = SmbCredentials::default()
                .server(format!("smb://{}:{}", config.host, config.port))
                .share(config.share.clone())
                .username(config.username.clone())
                .password(config.password.clone())
                .workgroup(config.domain.clone());

            let client = PavaoClient::new(
                credentials,
                SmbOptions::default().one_share_per_server(true),
            )
            .map_err(|e| Error::Connection(format!("could not connect to SMB: {}", e)))?;

            Ok(Self {
                client: Mutex::new(client),
            })
        }

        /// libsmbclient addresses with forward slashes.
        fn native_path(path: &str) -> String {
            let converted = path.replace('\\', "/");
            if converted.starts_with('/') {
                converted
            } else {
                format!("/{}", converted)
            }
        }

        fn translate(err: pavao::SmbError, context: &str) -> Error {
            match &err {
                pavao::SmbError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    Error::NotFound(format!("SMB {}: {}", context, err))
                }
                pavao::SmbError::Io(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
                    Error::AlreadyExists(format!("SMB {}: {}", context, err))
                }
                _ => Error::Storage(format!("SMB {}: {}", context, err)),
            }
        }
    }

    #[async_trait]
    impl SmbClient for NativeSmbClient {
        async fn mkdir(&self, path: &str) -> Result<()> {
            let client = self.client.lock().unwrap();
            client
                .mkdir(&Self::native_path(path), SmbMode::from(0o755))
                .map_err(|e| Self::translate(e, "mkdir"))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let client = self.client.lock().unwrap();
            let mut file = client
                .open_with(
                    &Self::native_path(path),
                    SmbOpenOptions::default().create(true).write(true),
                )
                .map_err(|e| Self::translate(e, "open for write"))?;
            file.write_all(data)
                .map_err(|e| Error::Storage(format!("SMB write: {}", e)))
        }

        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let client = self.client.lock().unwrap();
            let mut file = client
                .open_with(&Self::native_path(path), SmbOpenOptions::default().read(true))
                .map_err(|e| Self::translate(e, "open for read"))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| Error::Storage(format!("SMB read: {}", e)))?;
            Ok(data)
        }

        async fn unlink(&self, path: &str) -> Result<()> {
            let client = self.client.lock().unwrap();
            client
                .unlink(&Self::native_path(path))
                .map_err(|e| Self::translate(e, "unlink"))
        }

        async fn read_dir(&self, path: &str) -> Result<Vec<SmbDirEntry>> {
            let client = self.client.lock().unwrap();
            let entries = client
                .list_dir(&Self::native_path(path))
                .map_err(|e| Self::translate(e, "readdir"))?;

            Ok(entries
                .into_iter()
                .filter(|e| e.get_name() != "." && e.get_name() != "..")
                .map(|e| SmbDirEntry {
                    name: e.get_name().to_string(),
                    kind: match e.get_type() {
                        SmbDirentType::Dir => SmbEntryKind::Directory,
                        _ => SmbEntryKind::File,
                    },
                })
                .collect())
        }

        async fn disconnect(&self) -> Result<()> {
            // Dropping the context closes the connection; nothing to do here.
            Ok(())
        }
    }
}
