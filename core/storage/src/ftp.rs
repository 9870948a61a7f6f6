//! FTP storage provider.
//!
//! Backed by the blocking `suppaftp` client driven through
//! `spawn_blocking`. The connection slot lives behind an async mutex, so
//! concurrent operations racing to connect simply await the attempt already
//! in progress. Every operation retries exactly once on a fresh connection
//! after a failure; a second failure propagates to the caller.

use async_trait::async_trait;
use futures::StreamExt;
use std::io::Cursor;
use suppaftp::list::File as FtpEntry;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};
use tokio::sync::Mutex;

use crate::provider::{ByteStream, StorageProvider, Testable};
use archiva_common::{Error, RelativePath, Result};

/// FTP backend configuration.
#[derive(Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Remote prefix all relative paths resolve against.
    pub base_path: String,
}

impl FtpConfig {
    /// Default remote prefix when none is configured.
    pub const DEFAULT_BASE_PATH: &'static str = "/uploads";
}

impl std::fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// FTP storage provider.
pub struct FtpProvider {
    config: FtpConfig,
    conn: Mutex<Option<FtpStream>>,
}

/// Join a POSIX base prefix with a relative path. Also used by the SMB
/// variant before its backslash translation.
pub(crate) fn join_posix(base: &str, rel: &RelativePath) -> String {
    let base = base.trim_end_matches('/');
    match (base.is_empty(), rel.is_root()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", rel),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, rel),
    }
}

fn is_not_found(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable)
}

/// Re-apply the server-side and provider-relative prefixes to a listed
/// entry name.
fn child_paths(full: &str, rel: &str, name: &str) -> (String, String) {
    let child_full = format!("{}/{}", full.trim_end_matches('/'), name);
    let child_rel = if rel.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", rel, name)
    };
    (child_full, child_rel)
}

/// Walk a directory, pushing file paths with the parent-relative prefix
/// re-applied and descending depth-first when `recursive` is set.
fn list_dir(
    stream: &mut FtpStream,
    full: &str,
    rel: &str,
    recursive: bool,
    files: &mut Vec<String>,
) -> std::result::Result<(), FtpError> {
    let lines = stream.list(Some(full))?;
    for line in lines {
        let Ok(entry) = FtpEntry::try_from(line.as_str()) else {
            continue;
        };
        let (child_full, child_rel) = child_paths(full, rel, entry.name());
        if entry.is_file() {
            files.push(child_rel);
        } else if entry.is_directory() && recursive {
            list_dir(stream, &child_full, &child_rel, recursive, files)?;
        }
    }
    Ok(())
}

/// Create each missing component of `dir`, tolerating already-existing ones.
fn ensure_dir(stream: &mut FtpStream, dir: &str) {
    let mut current = String::new();
    for component in dir.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        let _ = stream.mkdir(&current);
    }
}

impl FtpProvider {
    /// Create a new provider. No connection is opened until the first
    /// operation.
    pub fn new(config: FtpConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    fn full_path(&self, path: &RelativePath) -> String {
        join_posix(&self.config.base_path, path)
    }

    fn translate(err: FtpError, context: &str) -> Error {
        if is_not_found(&err) {
            return Error::NotFound(format!("FTP {}: {}", context, err));
        }
        match err {
            FtpError::ConnectionError(io) => {
                Error::Connection(format!("FTP {}: {}", context, io))
            }
            other => Error::Storage(format!("FTP {}: {}", context, other)),
        }
    }

    /// Open and authenticate a fresh connection.
    async fn connect(config: &FtpConfig) -> Result<FtpStream> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || -> Result<FtpStream> {
            let mut stream = FtpStream::connect((config.host.as_str(), config.port))
                .map_err(|e| Error::Connection(format!("could not connect to FTP: {}", e)))?;
            stream
                .login(&config.user, &config.password)
                .map_err(|e| Error::Connection(format!("could not connect to FTP: {}", e)))?;
            stream
                .transfer_type(FileType::Binary)
                .map_err(|e| Error::Connection(format!("could not connect to FTP: {}", e)))?;
            Ok(stream)
        })
        .await
        .map_err(|e| Error::Connection(format!("could not connect to FTP: {}", e)))?
    }

    async fn run_blocking<T, F>(
        mut stream: FtpStream,
        op: F,
    ) -> Result<(FtpStream, std::result::Result<T, FtpError>)>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> std::result::Result<T, FtpError> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| Error::Storage(format!("FTP worker task failed: {}", e)))
    }

    /// Run `op` on the shared connection, reconnecting and retrying exactly
    /// once on failure. A second failure propagates untouched.
    async fn run<T, F>(&self, context: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&mut FtpStream) -> std::result::Result<T, FtpError> + Clone + Send + 'static,
    {
        let mut guard = self.conn.lock().await;

        let stream = match guard.take() {
            Some(stream) => stream,
            None => Self::connect(&self.config).await?,
        };

        let (stream, result) = Self::run_blocking(stream, op.clone()).await?;
        match result {
            Ok(value) => {
                *guard = Some(stream);
                Ok(value)
            }
            Err(_) => {
                // Connection state is suspect; rebuild it and retry once.
                drop(stream);
                let fresh = Self::connect(&self.config).await?;
                let (fresh, retried) = Self::run_blocking(fresh, op).await?;
                *guard = Some(fresh);
                retried.map_err(|err| Self::translate(err, context))
            }
        }
    }
}

#[async_trait]
impl StorageProvider for FtpProvider {
    fn name(&self) -> &str {
        "ftp"
    }

    async fn upload(&self, path: &RelativePath, data: Vec<u8>) -> Result<RelativePath> {
        let full = self.full_path(path);
        let dir = self.full_path(&path.parent().unwrap_or_else(RelativePath::root));

        self.run("upload", move |stream| {
            ensure_dir(stream, &dir);
            stream.put_file(&full, &mut Cursor::new(data.clone()))?;
            Ok(())
        })
        .await?;

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
        let full = self.full_path(path);
        self.run("download", move |stream| {
            stream.retr_as_buffer(&full).map(|cursor| cursor.into_inner())
        })
        .await
    }

    /// Deleting a missing file surfaces `Error::NotFound`.
    async fn delete(&self, path: &RelativePath) -> Result<()> {
        let full = self.full_path(path);
        self.run("delete", move |stream| stream.rm(&full)).await
    }

    async fn list(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>> {
        let full = self.full_path(path);
        let rel = path.as_str_path();

        let names = self
            .run("list", move |stream| {
                let mut files = Vec::new();
                match list_dir(stream, &full, &rel, recursive, &mut files) {
                    Ok(()) => Ok(files),
                    // A prefix that does not exist yet is an empty listing.
                    Err(err) if is_not_found(&err) => Ok(Vec::new()),
                    Err(err) => Err(err),
                }
            })
            .await?;

        names
            .iter()
            .map(|name| RelativePath::parse(name))
            .collect()
    }

    /// The protocol client has no dedicated stat call, so existence is
    /// checked by listing the parent directory for the basename.
    async fn exists(&self, path: &RelativePath) -> bool {
        let Some(name) = path.file_name().map(String::from) else {
            return false;
        };
        let parent_full = self.full_path(&path.parent().unwrap_or_else(RelativePath::root));

        self.run("exists", move |stream| {
            let lines = match stream.list(Some(&parent_full)) {
                Ok(lines) => lines,
                Err(err) if is_not_found(&err) => return Ok(false),
                Err(err) => return Err(err),
            };
            Ok(lines
                .iter()
                .filter_map(|line| FtpEntry::try_from(line.as_str()).ok())
                .any(|entry| entry.name() == name))
        })
        .await
        .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if let Some(mut stream) = guard.take() {
            let _ = tokio::task::spawn_blocking(move || stream.quit()).await;
        }
        Ok(())
    }

    fn as_testable(&self) -> Option<&dyn Testable> {
        Some(self)
    }
}

#[async_trait]
impl Testable for FtpProvider {
    async fn test_connection(&self) -> bool {
        self.run("test", |stream| stream.noop()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_posix() {
        let rel = RelativePath::parse("docs/a.txt").unwrap();
        assert_eq!(join_posix("/uploads", &rel), "/uploads/docs/a.txt");
        assert_eq!(join_posix("/uploads/", &rel), "/uploads/docs/a.txt");
        assert_eq!(join_posix("", &rel), "/docs/a.txt");
        assert_eq!(join_posix("/uploads", &RelativePath::root()), "/uploads");
        assert_eq!(join_posix("", &RelativePath::root()), "/");
    }

    #[test]
    fn test_child_paths_reapply_prefixes() {
        assert_eq!(
            child_paths("/uploads", "", "a.txt"),
            ("/uploads/a.txt".to_string(), "a.txt".to_string())
        );
        assert_eq!(
            child_paths("/uploads/sub/", "sub", "b.txt"),
            ("/uploads/sub/b.txt".to_string(), "sub/b.txt".to_string())
        );
        assert_eq!(
            child_paths("/uploads/sub/nested", "sub/nested", "c.txt"),
            (
                "/uploads/sub/nested/c.txt".to_string(),
                "sub/nested/c.txt".to_string()
            )
        );
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = FtpConfig {
            host: "ftp.example.test".to_string(),
            port: 21,
            user: "backoffice".to_string(),
            password: "hunter2".to_string(),
            base_path: FtpConfig::DEFAULT_BASE_PATH.to_string(),
        };
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 1 on loopback is refused immediately.
        let provider = FtpProvider::new(FtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "u".to_string(),
            password: "p".to_string(),
            base_path: "/uploads".to_string(),
        });

        let err = provider
            .download(&RelativePath::parse("a.txt").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(!provider.test_connection().await);
        assert!(!provider.exists(&RelativePath::parse("a.txt").unwrap()).await);
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected_is_safe() {
        let provider = FtpProvider::new(FtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "u".to_string(),
            password: "p".to_string(),
            base_path: "/uploads".to_string(),
        });
        provider.disconnect().await.unwrap();
    }
}
