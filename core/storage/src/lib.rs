//! Pluggable file-storage backends.
//!
//! A [`StorageProvider`] abstracts over local-disk, FTP and SMB backends
//! behind one async contract. Persisted [`StorageConfig`] records describe
//! the backends; the [`StorageFactory`] resolves the active record into a
//! live, cached provider instance, decrypting credentials with
//! [`archiva_crypto::CredentialCipher`] only at construction time.

pub mod config;
pub mod factory;
pub mod ftp;
pub mod local;
pub mod memory;
pub mod provider;
pub mod smb;
pub mod sqlite;

pub use config::{ConfigStore, MemoryConfigStore, StorageConfig};
pub use factory::{StorageFactory, TestReport};
pub use ftp::{FtpConfig, FtpProvider};
pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{ByteStream, StorageProvider, Testable};
pub use smb::{SmbClient, SmbConfig, SmbDirEntry, SmbEntryKind, SmbProvider};
pub use sqlite::SqliteConfigStore;
