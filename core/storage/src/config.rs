//! Persisted storage configuration records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use archiva_common::{BackendKind, Error, Result};

/// One persisted storage backend description.
///
/// The secret field only ever holds the opaque `iv:tag:ciphertext` form;
/// plaintext credentials are never stored or logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub encrypted_secret: Option<String>,
    /// Root prefix all relative paths are resolved against.
    pub base_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageConfig {
    /// Create a new inactive configuration with a fresh identifier.
    pub fn new(kind: BackendKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            host: None,
            port: None,
            username: None,
            encrypted_secret: None,
            base_path: None,
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence seam for configuration records.
///
/// Backed by the application's relational store in production; an
/// in-memory implementation exists for tests.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The configuration currently flagged active, if any.
    async fn find_active(&self) -> Result<Option<StorageConfig>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<StorageConfig>>;

    async fn insert(&self, config: &StorageConfig) -> Result<()>;

    async fn update(&self, config: &StorageConfig) -> Result<()>;

    /// Flip the active flag to `id` in one store-level operation:
    /// every other record is deactivated and the target activated, so the
    /// "exactly one active" invariant holds even across a crash.
    async fn set_active(&self, id: &str) -> Result<()>;
}

/// In-memory configuration store for tests.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: RwLock<HashMap<String, StorageConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn find_active(&self) -> Result<Option<StorageConfig>> {
        Ok(self
            .configs
            .read()
            .unwrap()
            .values()
            .find(|c| c.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StorageConfig>> {
        Ok(self.configs.read().unwrap().get(id).cloned())
    }

    async fn insert(&self, config: &StorageConfig) -> Result<()> {
        let mut configs = self.configs.write().unwrap();
        if configs.contains_key(&config.id) {
            return Err(Error::AlreadyExists(format!(
                "Storage configuration already exists: {}",
                config.id
            )));
        }
        configs.insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn update(&self, config: &StorageConfig) -> Result<()> {
        let mut configs = self.configs.write().unwrap();
        if !configs.contains_key(&config.id) {
            return Err(Error::NotFound(format!(
                "Storage configuration not found: {}",
                config.id
            )));
        }
        let mut updated = config.clone();
        updated.updated_at = Utc::now();
        configs.insert(config.id.clone(), updated);
        Ok(())
    }

    async fn set_active(&self, id: &str) -> Result<()> {
        let mut configs = self.configs.write().unwrap();
        if !configs.contains_key(id) {
            return Err(Error::NotFound(format!(
                "Storage configuration not found: {}",
                id
            )));
        }
        for config in configs.values_mut() {
            config.is_active = config.id == id;
            if config.is_active {
                config.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
