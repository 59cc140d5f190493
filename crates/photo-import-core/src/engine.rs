use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::ImportConfig;
use crate::copier::{CopyOptions, CopyStats, Copier};
use crate::error::Error;
use crate::media::{MediaKind, MetadataExtractor};
use crate::progress::{CancelToken, ProgressReporter};
use crate::scanner::{ScanOptions, ScanResult, Scanner};
use crate::storage::models::{Batch, BatchStats, FileStatus, MediaFile};
use crate::storage::Database;

/// Owns the ledger and wires the scan and copy phases together for one
/// media kind.
pub struct ImportEngine {
    config: ImportConfig,
    db: Database,
    extractor: Arc<dyn MetadataExtractor>,
    cancel: CancelToken,
}

impl ImportEngine {
    /// Open (or create) the ledger at `config.database_path`.
    pub fn new(config: ImportConfig, kind: MediaKind) -> Result<Self, Error> {
        let db = Database::open(&config.database_path)?;
        info!("Opened ledger at {}", config.database_path);
        Ok(Self::with_database(config, db, kind))
    }

    pub fn open_in_memory(config: ImportConfig, kind: MediaKind) -> Result<Self, Error> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(config, db, kind))
    }

    fn with_database(config: ImportConfig, db: Database, kind: MediaKind) -> Self {
        Self {
            config,
            db,
            extractor: kind.extractor(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the built-in extractor. The media kind follows the extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn media_kind(&self) -> MediaKind {
        self.extractor.media_kind()
    }

    /// Handle for interrupting a running scan or copy from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn scan(
        &self,
        source_root: &Path,
        target_root: &Path,
        options: &ScanOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        Scanner::new(
            &self.db,
            &self.config,
            Arc::clone(&self.extractor),
            reporter,
            self.cancel.clone(),
        )
        .scan(source_root, target_root, options)
    }

    /// Copy the pending files of `batch_id`, or of the most recent batch.
    pub fn copy(
        &self,
        batch_id: Option<i64>,
        dry_run: bool,
        options: &CopyOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<CopyStats, Error> {
        let batch_id = self.resolve_batch_id(batch_id)?;
        self.copier(options, reporter).copy(batch_id, dry_run)
    }

    pub fn retry_failed(
        &self,
        batch_id: Option<i64>,
        options: &CopyOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<CopyStats, Error> {
        let batch_id = self.resolve_batch_id(batch_id)?;
        self.copier(options, reporter).retry_failed(batch_id)
    }

    /// The batch with `batch_id`, or the most recent one.
    pub fn get_batch(&self, batch_id: Option<i64>) -> Result<Batch, Error> {
        match batch_id {
            Some(id) => self.db.get_batch(id)?.ok_or(Error::BatchNotFound(id)),
            None => self.db.get_latest_batch()?.ok_or(Error::NoBatches),
        }
    }

    pub fn list_batches(&self, limit: i64) -> Result<Vec<Batch>, Error> {
        Ok(self.db.list_batches(limit)?)
    }

    pub fn get_batch_stats(&self, batch_id: i64) -> Result<BatchStats, Error> {
        Ok(self.db.get_batch_stats(batch_id)?)
    }

    pub fn get_files_by_status(
        &self,
        batch_id: i64,
        status: FileStatus,
        limit: Option<i64>,
    ) -> Result<Vec<MediaFile>, Error> {
        Ok(self.db.get_files_by_status(batch_id, status, limit)?)
    }

    fn resolve_batch_id(&self, batch_id: Option<i64>) -> Result<i64, Error> {
        Ok(self.get_batch(batch_id)?.id)
    }

    fn copier<'a>(&'a self, options: &CopyOptions, reporter: &'a dyn ProgressReporter) -> Copier<'a> {
        Copier::new(
            &self.db,
            &self.config,
            options.clone(),
            reporter,
            self.cancel.clone(),
        )
    }
}
