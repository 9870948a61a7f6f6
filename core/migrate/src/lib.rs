//! Cross-backend storage migration.
//!
//! [`MigrationEngine`] copies files between two already-resolved providers
//! with all-or-rollback semantics; [`migrate_storage`] wires it to the
//! configuration store: it resolves source and target through the factory,
//! runs the engine, and only on success flips the active configuration and
//! clears the factory cache.

pub mod engine;

pub use engine::{MigrationEngine, MigrationReport};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use archiva_common::{Error, Result, SystemEventSink};
use archiva_storage::StorageFactory;

/// Migrate every file from the active configuration's backend to the
/// backend described by `target_config_id`, then make that configuration
/// active.
///
/// # Errors
/// - `Error::Config` if no configuration is active
/// - `Error::InvalidInput` if the target is already the active configuration
/// - `Error::NotFound` if the target configuration does not exist
/// - Any engine failure, after rollback has run
pub async fn migrate_storage(
    factory: &StorageFactory,
    target_config_id: &str,
    sink: Arc<dyn SystemEventSink>,
    cancel: CancellationToken,
) -> Result<MigrationReport> {
    let active = factory
        .store()
        .find_active()
        .await?
        .ok_or_else(|| Error::Config("No active storage configuration".to_string()))?;

    if active.id == target_config_id {
        return Err(Error::InvalidInput(
            "Target configuration is already active".to_string(),
        ));
    }

    // Both endpoints bypass the factory cache; the active instance stays
    // untouched until the flip.
    let source = factory.provider_for(&active.id).await?;
    let target = factory.provider_for(target_config_id).await?;

    let engine = MigrationEngine::new(sink).with_cancellation(cancel);
    let outcome = engine.run(source.as_ref(), target.as_ref()).await;

    // Both endpoints are released whichever way the run ended.
    if let Err(err) = source.disconnect().await {
        warn!("failed to disconnect migration source: {}", err);
    }
    if let Err(err) = target.disconnect().await {
        warn!("failed to disconnect migration target: {}", err);
    }

    let report = outcome?;

    // Success is the only path that changes which configuration is active.
    factory.store().set_active(target_config_id).await?;
    factory.clear_cache().await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_common::{BackendKind, MemoryEventSink, RelativePath};
    use archiva_storage::{ConfigStore, LocalProvider, MemoryConfigStore, StorageConfig, StorageProvider};
    use tempfile::TempDir;

    fn local_config(temp: &TempDir) -> StorageConfig {
        let mut config = StorageConfig::new(BackendKind::Local);
        config.base_path = Some(temp.path().to_str().unwrap().to_string());
        config
    }

    async fn setup() -> (Arc<MemoryConfigStore>, StorageFactory, TempDir, TempDir, StorageConfig, StorageConfig) {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());

        let source_config = local_config(&source_dir);
        let target_config = local_config(&target_dir);
        store.insert(&source_config).await.unwrap();
        store.insert(&target_config).await.unwrap();
        store.set_active(&source_config.id).await.unwrap();

        let factory = StorageFactory::new(store.clone() as Arc<dyn ConfigStore>);
        (store, factory, source_dir, target_dir, source_config, target_config)
    }

    #[tokio::test]
    async fn test_migrate_storage_copies_and_flips_active() {
        let (store, factory, source_dir, _target_dir, _source_config, target_config) =
            setup().await;

        let source = LocalProvider::new(source_dir.path()).unwrap();
        source
            .upload(&RelativePath::parse("a.txt").unwrap(), b"hello".to_vec())
            .await
            .unwrap();
        source
            .upload(&RelativePath::parse("sub/b.txt").unwrap(), b"0123456789".to_vec())
            .await
            .unwrap();

        let report = migrate_storage(
            &factory,
            &target_config.id,
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(report.success);
        assert_eq!(report.migrated_files, 2);
        assert_eq!(
            store.find_active().await.unwrap().unwrap().id,
            target_config.id
        );

        // The new active provider serves the migrated content.
        let active = factory.active_provider().await.unwrap();
        assert_eq!(
            active.download(&RelativePath::parse("a.txt").unwrap()).await.unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_migrate_to_already_active_config_is_rejected() {
        let (store, factory, _source_dir, _target_dir, source_config, _target_config) =
            setup().await;

        let err = migrate_storage(
            &factory,
            &source_config.id,
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            store.find_active().await.unwrap().unwrap().id,
            source_config.id
        );
    }

    #[tokio::test]
    async fn test_migrate_to_missing_config_is_not_found() {
        let (_store, factory, _source_dir, _target_dir, _source_config, _target_config) =
            setup().await;

        let err = migrate_storage(
            &factory,
            "missing",
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_migrate_without_active_config_fails() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());
        let target_config = local_config(&temp);
        store.insert(&target_config).await.unwrap();

        let factory = StorageFactory::new(store as Arc<dyn ConfigStore>);
        let err = migrate_storage(
            &factory,
            &target_config.id,
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_failed_remote_migration_surfaces_original_error() {
        let source_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());

        let source_config = local_config(&source_dir);
        store.insert(&source_config).await.unwrap();
        store.set_active(&source_config.id).await.unwrap();

        let cipher =
            archiva_crypto::CredentialCipher::new("an-example-secret-of-at-least-32-bytes")
                .unwrap();
        let mut target_config = StorageConfig::new(BackendKind::Ftp);
        // Port 1 on loopback is refused immediately.
        target_config.host = Some("127.0.0.1".to_string());
        target_config.port = Some(1);
        target_config.username = Some("svc".to_string());
        target_config.encrypted_secret = Some(cipher.encrypt("pw").unwrap());
        store.insert(&target_config).await.unwrap();

        let source = LocalProvider::new(source_dir.path()).unwrap();
        source
            .upload(&RelativePath::parse("a.txt").unwrap(), b"hello".to_vec())
            .await
            .unwrap();

        let factory =
            StorageFactory::new(store.clone() as Arc<dyn ConfigStore>).with_cipher(cipher);
        let err = migrate_storage(
            &factory,
            &target_config.id,
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        // The engine's failure comes through untouched after both
        // endpoints have been disconnected, and the flip never ran.
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(
            store.find_active().await.unwrap().unwrap().id,
            source_config.id
        );
    }

    #[tokio::test]
    async fn test_failed_migration_leaves_active_config_untouched() {
        let (store, factory, source_dir, target_dir, source_config, target_config) =
            setup().await;

        let source = LocalProvider::new(source_dir.path()).unwrap();
        source
            .upload(&RelativePath::parse("a.txt").unwrap(), b"hello".to_vec())
            .await
            .unwrap();

        // Point the target at a path occupied by a plain file, so uploads
        // fail when creating directories under it.
        drop(target_dir);
        let blocker_dir = TempDir::new().unwrap();
        let blocker = blocker_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let mut broken = target_config.clone();
        broken.base_path = Some(blocker.to_str().unwrap().to_string());
        store.update(&broken).await.unwrap();

        let result = migrate_storage(
            &factory,
            &target_config.id,
            Arc::new(MemoryEventSink::new()),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(
            store.find_active().await.unwrap().unwrap().id,
            source_config.id
        );
    }
}
