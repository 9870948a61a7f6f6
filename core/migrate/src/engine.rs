//! All-or-rollback migration between two storage providers.
//!
//! Files are copied strictly one at a time; the first failure aborts the
//! run, already-copied files are deleted from the target best-effort, and
//! the original failure is re-raised. The engine never flips the active
//! configuration itself; that decision belongs to the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use archiva_common::{
    Error, EventLevel, RelativePath, Result, SystemEvent, SystemEventSink,
};
use archiva_storage::StorageProvider;

/// Outcome of one migration run.
///
/// Only produced when the run completes; an aborted run surfaces as an
/// error instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub total_files: usize,
    pub migrated_files: usize,
    pub errors: Vec<String>,
    pub success: bool,
}

impl MigrationReport {
    fn completed(total: usize) -> Self {
        Self {
            total_files: total,
            migrated_files: total,
            errors: Vec::new(),
            success: true,
        }
    }
}

/// Sequential copy engine with rollback on first failure.
pub struct MigrationEngine {
    sink: Arc<dyn SystemEventSink>,
    cancel: CancellationToken,
}

impl MigrationEngine {
    pub fn new(sink: Arc<dyn SystemEventSink>) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally-owned token so a running migration can be
    /// cancelled between file copies.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn emit(&self, level: EventLevel, message: String) {
        self.sink.emit(SystemEvent::migration(level, message));
    }

    /// Copy every file under the source root onto the target.
    ///
    /// An empty source is a successful no-op. On any failure the files
    /// copied so far are deleted from the target (best-effort, deletion
    /// failures are logged and skipped) and the original error is
    /// returned. Cancellation is honored between file copies and triggers
    /// the same rollback.
    pub async fn run(
        &self,
        source: &dyn StorageProvider,
        target: &dyn StorageProvider,
    ) -> Result<MigrationReport> {
        let files = source.list(&RelativePath::root(), true).await?;
        let total = files.len();

        if total == 0 {
            self.emit(
                EventLevel::Success,
                "Migration complete: no files to migrate".to_string(),
            );
            return Ok(MigrationReport {
                total_files: 0,
                migrated_files: 0,
                errors: Vec::new(),
                success: true,
            });
        }

        self.emit(
            EventLevel::Info,
            format!(
                "Starting migration: {} files from {} to {}",
                total,
                source.name(),
                target.name()
            ),
        );

        let mut migrated: Vec<RelativePath> = Vec::with_capacity(total);

        for (index, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.emit(
                    EventLevel::Warning,
                    format!(
                        "Migration cancelled after {} of {} files",
                        migrated.len(),
                        total
                    ),
                );
                self.rollback(target, &migrated).await;
                return Err(Error::Cancelled(format!(
                    "migration cancelled after {} of {} files",
                    migrated.len(),
                    total
                )));
            }

            if let Err(err) = self.copy_one(source, target, path).await {
                self.emit(
                    EventLevel::Error,
                    format!("Migration failed at {}: {}", path, err),
                );
                self.rollback(target, &migrated).await;
                return Err(err);
            }
            migrated.push(path.clone());

            let progress = ((index + 1) * 100 / total) as u8;
            self.sink.emit(
                SystemEvent::migration(
                    EventLevel::Info,
                    format!("Migrating [{}/{}]: {}", index + 1, total, path),
                )
                .with_progress(progress),
            );
        }

        info!(total, source = source.name(), target = target.name(), "migration complete");
        self.emit(
            EventLevel::Success,
            format!("Migration complete: {} files migrated", total),
        );
        Ok(MigrationReport::completed(total))
    }

    async fn copy_one(
        &self,
        source: &dyn StorageProvider,
        target: &dyn StorageProvider,
        path: &RelativePath,
    ) -> Result<()> {
        let data = source.download(path).await?;
        target.upload(path, data).await?;
        Ok(())
    }

    /// Delete every already-migrated path from the target. Failures are
    /// logged and skipped so the remaining deletions still run.
    async fn rollback(&self, target: &dyn StorageProvider, migrated: &[RelativePath]) {
        if migrated.is_empty() {
            return;
        }
        self.emit(
            EventLevel::Warning,
            format!("Rolling back {} migrated files", migrated.len()),
        );
        for path in migrated {
            if let Err(err) = target.delete(path).await {
                warn!(%path, "rollback deletion failed: {}", err);
                self.emit(
                    EventLevel::Warning,
                    format!("Rollback: could not delete {} from target: {}", path, err),
                );
            }
        }
    }
}
