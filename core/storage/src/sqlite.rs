//! SQLite-backed configuration store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use crate::config::{ConfigStore, StorageConfig};
use archiva_common::{BackendKind, Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS storage_configs (
    id               TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,
    host             TEXT,
    port             INTEGER,
    username         TEXT,
    encrypted_secret TEXT,
    base_path        TEXT,
    is_active        INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
";

const COLUMNS: &str =
    "id, kind, host, port, username, encrypted_secret, base_path, is_active, created_at, updated_at";

/// Configuration store over a SQLite database.
///
/// Queries are single-row lookups and tiny updates, run directly under a
/// connection mutex.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

fn db_err(err: rusqlite::Error) -> Error {
    Error::Storage(format!("config store: {}", err))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("config store: bad timestamp: {}", e)))
}

/// Column values before kind/timestamp parsing.
struct RawRow {
    id: String,
    kind: String,
    host: Option<String>,
    port: Option<i64>,
    username: Option<String>,
    encrypted_secret: Option<String>,
    base_path: Option<String>,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        username: row.get(4)?,
        encrypted_secret: row.get(5)?,
        base_path: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<RawRow> for StorageConfig {
    type Error = Error;

    fn try_from(raw: RawRow) -> Result<Self> {
        Ok(StorageConfig {
            id: raw.id,
            kind: BackendKind::from_str(&raw.kind)?,
            host: raw.host,
            port: raw.port.map(|p| p as u16),
            username: raw.username,
            encrypted_secret: raw.encrypted_secret,
            base_path: raw.base_path,
            is_active: raw.is_active != 0,
            created_at: parse_timestamp(&raw.created_at)?,
            updated_at: parse_timestamp(&raw.updated_at)?,
        })
    }
}

impl SqliteConfigStore {
    /// Open (and initialize) a store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path).map_err(db_err)?)
    }

    /// Open a store backed by an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_one(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Option<StorageConfig>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(sql, params, row_to_raw)
            .optional()
            .map_err(db_err)?;

        raw.map(StorageConfig::try_from).transpose()
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn find_active(&self) -> Result<Option<StorageConfig>> {
        self.query_one(
            &format!("SELECT {} FROM storage_configs WHERE is_active = 1 LIMIT 1", COLUMNS),
            &[],
        )
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StorageConfig>> {
        self.query_one(
            &format!("SELECT {} FROM storage_configs WHERE id = ?1", COLUMNS),
            &[&id],
        )
    }

    async fn insert(&self, config: &StorageConfig) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO storage_configs
                 (id, kind, host, port, username, encrypted_secret, base_path, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    config.id,
                    config.kind.as_str(),
                    config.host,
                    config.port.map(|p| p as i64),
                    config.username,
                    config.encrypted_secret,
                    config.base_path,
                    config.is_active as i64,
                    config.created_at.to_rfc3339(),
                    config.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        if inserted == 0 {
            return Err(Error::AlreadyExists(format!(
                "Storage configuration already exists: {}",
                config.id
            )));
        }
        Ok(())
    }

    async fn update(&self, config: &StorageConfig) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE storage_configs
                 SET kind = ?2, host = ?3, port = ?4, username = ?5,
                     encrypted_secret = ?6, base_path = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    config.id,
                    config.kind.as_str(),
                    config.host,
                    config.port.map(|p| p as i64),
                    config.username,
                    config.encrypted_secret,
                    config.base_path,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(Error::NotFound(format!(
                "Storage configuration not found: {}",
                config.id
            )));
        }
        Ok(())
    }

    async fn set_active(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute("UPDATE storage_configs SET is_active = 0 WHERE is_active = 1", [])
            .map_err(db_err)?;
        let activated = tx
            .execute(
                "UPDATE storage_configs SET is_active = 1, updated_at = ?2 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;

        if activated == 0 {
            // Roll back the deactivation so the previous flag survives.
            drop(tx);
            return Err(Error::NotFound(format!(
                "Storage configuration not found: {}",
                id
            )));
        }

        tx.commit().map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: BackendKind) -> StorageConfig {
        let mut config = StorageConfig::new(kind);
        config.host = Some("files.example.test".to_string());
        config.port = Some(21);
        config.username = Some("svc".to_string());
        config.encrypted_secret = Some("aa:bb:cc".to_string());
        config.base_path = Some("/uploads".to_string());
        config
    }

    #[tokio::test]
    async fn test_insert_and_find_roundtrip() {
        let store = SqliteConfigStore::open_in_memory().unwrap();
        let config = sample(BackendKind::Ftp);
        store.insert(&config).await.unwrap();

        let found = store.find_by_id(&config.id).await.unwrap().unwrap();
        assert_eq!(found.kind, BackendKind::Ftp);
        assert_eq!(found.host.as_deref(), Some("files.example.test"));
        assert_eq!(found.port, Some(21));
        assert_eq!(found.encrypted_secret.as_deref(), Some("aa:bb:cc"));
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn test_find_active_empty_store() {
        let store = SqliteConfigStore::open_in_memory().unwrap();
        assert!(store.find_active().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_active_flip_is_exclusive() {
        let store = SqliteConfigStore::open_in_memory().unwrap();
        let a = sample(BackendKind::Local);
        let b = sample(BackendKind::Smb);
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        store.set_active(&a.id).await.unwrap();
        store.set_active(&b.id).await.unwrap();

        assert_eq!(store.find_active().await.unwrap().unwrap().id, b.id);
        assert!(!store.find_by_id(&a.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_set_active_unknown_id_preserves_previous_flag() {
        let store = SqliteConfigStore::open_in_memory().unwrap();
        let a = sample(BackendKind::Local);
        store.insert(&a).await.unwrap();
        store.set_active(&a.id).await.unwrap();

        assert!(store.set_active("missing").await.unwrap_err().is_not_found());
        assert_eq!(store.find_active().await.unwrap().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = SqliteConfigStore::open_in_memory().unwrap();
        let config = sample(BackendKind::Local);
        assert!(store.update(&config).await.unwrap_err().is_not_found());
    }
}
