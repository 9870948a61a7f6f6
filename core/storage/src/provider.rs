//! Storage provider trait definition.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use archiva_common::{RelativePath, Result};

/// Byte stream type for streamed uploads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Storage provider trait for the pluggable backends.
///
/// All paths are provider-root-relative; each variant translates them into
/// its native addressing scheme. Implementations handle their own
/// connection management and reconnection.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g. "local", "ftp", "smb").
    fn name(&self) -> &str;

    /// Persist `data` at the given relative path.
    ///
    /// # Postconditions
    /// - Missing intermediate directories are created
    /// - Returns the same relative path on success
    async fn upload(&self, path: &RelativePath, data: Vec<u8>) -> Result<RelativePath>;

    /// Persist a byte stream at the given relative path.
    async fn upload_stream(&self, path: &RelativePath, stream: ByteStream) -> Result<RelativePath>;

    /// Return the full content stored at `path`.
    ///
    /// # Errors
    /// - `Error::NotFound` if the file is absent
    async fn download(&self, path: &RelativePath) -> Result<Vec<u8>>;

    /// Remove the file at `path`.
    ///
    /// Behavior on a missing file is backend-specific and documented per
    /// variant.
    async fn delete(&self, path: &RelativePath) -> Result<()>;

    /// List files under `path`.
    ///
    /// Returns files only, never directory markers. With `recursive` set to
    /// false, only immediate file children of the prefix are returned.
    async fn list(&self, path: &RelativePath, recursive: bool) -> Result<Vec<RelativePath>>;

    /// Check whether `path` exists. Returns false on any lookup failure.
    async fn exists(&self, path: &RelativePath) -> bool;

    /// Public URL for an uploaded file.
    ///
    /// Pure string construction, identical across variants. Network
    /// reachability of the URL is the HTTP layer's concern.
    fn public_url(&self, path: &RelativePath) -> String {
        format!("/uploads/{}", path)
    }

    /// Release any held connection. Safe to call when not connected.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Narrow to the connection-test capability, if this variant has one.
    fn as_testable(&self) -> Option<&dyn Testable> {
        None
    }
}

impl std::fmt::Debug for dyn StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Optional capability: lightweight connection round-trip.
#[async_trait]
pub trait Testable: Send + Sync {
    /// Attempt a lightweight round-trip. Returns false rather than erroring.
    async fn test_connection(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProvider;

    #[test]
    fn test_public_url_shape() {
        let provider = MemoryProvider::new();
        let path = RelativePath::parse("docs/2024/a.pdf").unwrap();
        assert_eq!(provider.public_url(&path), "/uploads/docs/2024/a.pdf");
    }

    #[test]
    fn test_default_capabilities() {
        let provider = MemoryProvider::new();
        assert!(provider.as_testable().is_none());
    }
}
