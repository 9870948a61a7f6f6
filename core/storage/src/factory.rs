//! Resolves persisted configurations into live provider instances.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{ConfigStore, StorageConfig};
use crate::ftp::{FtpConfig, FtpProvider};
use crate::local::LocalProvider;
use crate::provider::StorageProvider;
use archiva_common::{BackendKind, Error, Result};
use archiva_crypto::CredentialCipher;

/// Outcome of probing an unsaved configuration.
///
/// Returned as data rather than raised, so administrative UIs can render
/// it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub success: bool,
    pub message: String,
}

struct CachedProvider {
    /// Identifier of the configuration the instance was built from;
    /// `None` for the default local fallback.
    config_id: Option<String>,
    provider: Arc<dyn StorageProvider>,
}

/// Factory with a one-slot cache for the active provider.
///
/// The cache is guarded by a mutex, so concurrent callers during a
/// configuration change serialize on the check-else-rebuild sequence
/// instead of constructing duplicate instances.
pub struct StorageFactory {
    store: Arc<dyn ConfigStore>,
    cipher: Option<CredentialCipher>,
    default_local_root: Option<PathBuf>,
    cache: Mutex<Option<CachedProvider>>,
}

impl StorageFactory {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            cipher: None,
            default_local_root: None,
            cache: Mutex::new(None),
        }
    }

    /// Inject a credential cipher instead of reading the key from the
    /// environment at first use.
    pub fn with_cipher(mut self, cipher: CredentialCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Override the base directory of the no-configuration local fallback.
    pub fn with_default_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.default_local_root = Some(root.into());
        self
    }

    /// The configuration store this factory reads from.
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Provider for the currently-active configuration.
    ///
    /// Returns the cached instance while the active configuration is
    /// unchanged; otherwise disconnects the stale instance and builds a
    /// fresh one. With no active configuration a default local provider is
    /// used.
    pub async fn active_provider(&self) -> Result<Arc<dyn StorageProvider>> {
        let mut cache = self.cache.lock().await;

        let active = self.store.find_active().await?;
        let active_id = active.as_ref().map(|c| c.id.clone());

        if let Some(cached) = cache.as_ref() {
            if cached.config_id == active_id {
                return Ok(cached.provider.clone());
            }
        }

        if let Some(stale) = cache.take() {
            debug!(from = ?stale.config_id, to = ?active_id, "active configuration changed, rebuilding provider");
            if let Err(err) = stale.provider.disconnect().await {
                warn!("failed to disconnect stale provider: {}", err);
            }
        }

        let provider = self.build(active.as_ref())?;
        *cache = Some(CachedProvider {
            config_id: active_id,
            provider: provider.clone(),
        });
        Ok(provider)
    }

    /// Provider for an arbitrary configuration, bypassing the cache.
    ///
    /// Used by the migration engine to build source/target endpoints
    /// without disturbing the active-provider cache.
    pub async fn provider_for(&self, id: &str) -> Result<Arc<dyn StorageProvider>> {
        let config = self.store.find_by_id(id).await?.ok_or_else(|| {
            Error::NotFound(format!("Storage configuration not found: {}", id))
        })?;
        self.build(Some(&config))
    }

    /// Probe an in-memory (not necessarily persisted) configuration.
    pub async fn test_configuration(&self, config: &StorageConfig) -> TestReport {
        let provider = match self.build(Some(config)) {
            Ok(provider) => provider,
            Err(err) => {
                return TestReport {
                    success: false,
                    message: err.to_string(),
                }
            }
        };

        match provider.as_testable() {
            Some(testable) => {
                if testable.test_connection().await {
                    TestReport {
                        success: true,
                        message: "Connection successful".to_string(),
                    }
                } else {
                    TestReport {
                        success: false,
                        message: "Connection failed".to_string(),
                    }
                }
            }
            None => TestReport {
                success: true,
                message: "Provider created successfully".to_string(),
            },
        }
    }

    /// Disconnect and discard the cached instance, forcing the next
    /// `active_provider` call to rebuild.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.take() {
            if let Err(err) = cached.provider.disconnect().await {
                warn!("failed to disconnect cached provider: {}", err);
            }
        }
    }

    fn cipher(&self) -> Result<CredentialCipher> {
        match &self.cipher {
            Some(cipher) => Ok(cipher.clone()),
            None => CredentialCipher::from_env(),
        }
    }

    fn build(&self, config: Option<&StorageConfig>) -> Result<Arc<dyn StorageProvider>> {
        let Some(config) = config else {
            return self.build_default_local();
        };

        match config.kind {
            BackendKind::Local => {
                let Some(base_path) = config.base_path.as_deref() else {
                    return self.build_default_local();
                };
                let base = PathBuf::from(base_path);
                let root = if base.is_absolute() {
                    base
                } else {
                    std::env::current_dir()?.join(base)
                };
                Ok(Arc::new(LocalProvider::new(root)?))
            }
            BackendKind::Ftp => self.build_ftp(config),
            BackendKind::Smb => self.build_smb(config),
        }
    }

    fn build_default_local(&self) -> Result<Arc<dyn StorageProvider>> {
        let provider = match &self.default_local_root {
            Some(root) => LocalProvider::new(root)?,
            None => LocalProvider::with_default_root()?,
        };
        Ok(Arc::new(provider))
    }

    fn build_ftp(&self, config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
        let (Some(host), Some(port), Some(user), Some(secret)) = (
            config.host.as_deref(),
            config.port,
            config.username.as_deref(),
            config.encrypted_secret.as_deref(),
        ) else {
            return Err(Error::Config(
                "FTP configuration incomplete: host, port, username and secret are required"
                    .to_string(),
            ));
        };

        // Decrypted immediately before construction, held only by the provider.
        let password = self.cipher()?.decrypt(secret)?;

        Ok(Arc::new(FtpProvider::new(FtpConfig {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password,
            base_path: config
                .base_path
                .clone()
                .unwrap_or_else(|| FtpConfig::DEFAULT_BASE_PATH.to_string()),
        })))
    }

    #[cfg(feature = "smb-native")]
    fn build_smb(&self, config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
        use crate::smb::{native::NativeSmbClient, SmbConfig, SmbProvider};

        let (Some(host), Some(user), Some(secret)) = (
            config.host.as_deref(),
            config.username.as_deref(),
            config.encrypted_secret.as_deref(),
        ) else {
            return Err(Error::Config(
                "SMB configuration incomplete: host, username and secret are required".to_string(),
            ));
        };

        let password = self.cipher()?.decrypt(secret)?;

        // The first base-path component is the share name, the rest the
        // share-relative prefix.
        let raw = config.base_path.clone().unwrap_or_default();
        let mut parts = raw.split('/').filter(|p| !p.is_empty());
        let share = parts.next().unwrap_or("uploads").to_string();
        let base_path = format!("/{}", parts.collect::<Vec<_>>().join("/"));

        let smb_config = SmbConfig {
            host: host.to_string(),
            port: config.port.unwrap_or(SmbConfig::DEFAULT_PORT),
            share,
            domain: String::new(),
            username: user.to_string(),
            password,
            base_path,
        };

        let client = NativeSmbClient::connect(&smb_config)?;
        Ok(Arc::new(SmbProvider::new(smb_config, Arc::new(client))))
    }

    #[cfg(not(feature = "smb-native"))]
    fn build_smb(&self, config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
        if config.host.is_none() || config.username.is_none() || config.encrypted_secret.is_none() {
            return Err(Error::Config(
                "SMB configuration incomplete: host, username and secret are required".to_string(),
            ));
        }
        Err(Error::Config(
            "SMB backend support is not compiled in (enable the smb-native feature)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use tempfile::TempDir;

    fn factory_with(store: Arc<dyn ConfigStore>, temp: &TempDir) -> StorageFactory {
        StorageFactory::new(store)
            .with_default_local_root(temp.path())
            .with_cipher(
                CredentialCipher::new("an-example-secret-of-at-least-32-bytes").unwrap(),
            )
    }

    fn local_config(temp: &TempDir) -> StorageConfig {
        let mut config = StorageConfig::new(BackendKind::Local);
        config.base_path = Some(temp.path().to_str().unwrap().to_string());
        config
    }

    #[tokio::test]
    async fn test_active_provider_is_cached_by_identity() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let first = factory.active_provider().await.unwrap();
        let second = factory.active_provider().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "local");
    }

    #[tokio::test]
    async fn test_clear_cache_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let first = factory.active_provider().await.unwrap();
        factory.clear_cache().await;
        let second = factory.active_provider().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_configuration_change_rebuilds_provider() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());
        let factory = factory_with(store.clone(), &temp);

        let first = factory.active_provider().await.unwrap();

        let config = local_config(&other);
        store.insert(&config).await.unwrap();
        store.set_active(&config.id).await.unwrap();

        let second = factory.active_provider().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        // Unchanged again afterwards.
        let third = factory.active_provider().await.unwrap();
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn test_provider_for_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let err = factory.provider_for("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_incomplete_ftp_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());
        let factory = factory_with(store.clone(), &temp);

        let config = StorageConfig::new(BackendKind::Ftp);
        store.insert(&config).await.unwrap();

        let err = factory.provider_for(&config.id).await.unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("FTP")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_ftp_config_builds_without_io() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());
        let factory = factory_with(store.clone(), &temp);

        let cipher = CredentialCipher::new("an-example-secret-of-at-least-32-bytes").unwrap();
        let mut config = StorageConfig::new(BackendKind::Ftp);
        config.host = Some("127.0.0.1".to_string());
        config.port = Some(21);
        config.username = Some("svc".to_string());
        config.encrypted_secret = Some(cipher.encrypt("pw").unwrap());
        store.insert(&config).await.unwrap();

        let provider = factory.provider_for(&config.id).await.unwrap();
        assert_eq!(provider.name(), "ftp");
        assert!(provider.as_testable().is_some());
    }

    #[tokio::test]
    async fn test_test_configuration_local_succeeds_without_capability() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let report = factory.test_configuration(&local_config(&temp)).await;
        assert!(report.success);
        assert_eq!(report.message, "Provider created successfully");
    }

    #[tokio::test]
    async fn test_test_configuration_unreachable_ftp_reports_failure() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let cipher = CredentialCipher::new("an-example-secret-of-at-least-32-bytes").unwrap();
        let mut config = StorageConfig::new(BackendKind::Ftp);
        config.host = Some("127.0.0.1".to_string());
        config.port = Some(1);
        config.username = Some("svc".to_string());
        config.encrypted_secret = Some(cipher.encrypt("pw").unwrap());

        let report = factory.test_configuration(&config).await;
        assert!(!report.success);
    }

    #[cfg(not(feature = "smb-native"))]
    #[tokio::test]
    async fn test_smb_without_native_support_is_config_error() {
        let temp = TempDir::new().unwrap();
        let factory = factory_with(Arc::new(MemoryConfigStore::new()), &temp);

        let cipher = CredentialCipher::new("an-example-secret-of-at-least-32-bytes").unwrap();
        let mut config = StorageConfig::new(BackendKind::Smb);
        config.host = Some("nas".to_string());
        config.username = Some("svc".to_string());
        config.encrypted_secret = Some(cipher.encrypt("pw").unwrap());

        let report = factory.test_configuration(&config).await;
        assert!(!report.success);
        assert!(report.message.contains("smb-native"));
    }
}
