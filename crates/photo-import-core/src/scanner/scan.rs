use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info, warn};

use super::walk;
use crate::config::ImportConfig;
use crate::error::Error;
use crate::media::MetadataExtractor;
use crate::platform;
use crate::progress::{CancelToken, ProgressReporter};
use crate::storage::models::{Batch, BatchStatus};
use crate::storage::{Database, NewMediaFile};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub checksums: bool,
    /// Reuse the active batch for the same source root instead of opening a new one.
    pub resume: bool,
    /// Overrides the configured worker count.
    pub workers: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            checksums: true,
            resume: true,
            workers: None,
        }
    }
}

#[derive(Debug)]
pub struct ScanResult {
    pub batch: Batch,
    pub discovered: usize,
    pub already_catalogued: usize,
    pub catalogued: usize,
    pub extraction_failures: usize,
    pub duration: Duration,
}

#[derive(Default)]
struct Progress {
    scanned: usize,
    catalogued: usize,
    failures: usize,
    last_path: Option<String>,
    error: Option<Error>,
}

/// Parallel cataloguing of a source tree into the ledger.
///
/// Workers extract metadata and send results over a channel; the calling
/// thread is the only one that touches the database.
pub struct Scanner<'a> {
    db: &'a Database,
    config: &'a ImportConfig,
    extractor: Arc<dyn MetadataExtractor>,
    reporter: &'a dyn ProgressReporter,
    cancel: CancelToken,
}

impl<'a> Scanner<'a> {
    pub fn new(
        db: &'a Database,
        config: &'a ImportConfig,
        extractor: Arc<dyn MetadataExtractor>,
        reporter: &'a dyn ProgressReporter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            db,
            config,
            extractor,
            reporter,
            cancel,
        }
    }

    pub fn scan(
        &self,
        source_root: &Path,
        target_root: &Path,
        options: &ScanOptions,
    ) -> Result<ScanResult, Error> {
        let started = Instant::now();
        let kind = self.extractor.media_kind();
        let source = resolve_source(source_root)?;
        let target = std::path::absolute(target_root)?;
        let source_str = utf8_path(&source)?;
        let target_str = utf8_path(&target)?;

        let active = if options.resume {
            self.db.get_active_batch(&source_str, kind)?
        } else {
            None
        };

        let batch = match active {
            Some(batch)
                if matches!(
                    batch.status,
                    BatchStatus::Scanned | BatchStatus::Copying | BatchStatus::Completed
                ) =>
            {
                info!("Found existing batch #{} in status {}", batch.id, batch.status);
                let known = batch.total_files as usize;
                return Ok(ScanResult {
                    batch,
                    discovered: known,
                    already_catalogued: known,
                    catalogued: 0,
                    extraction_failures: 0,
                    duration: started.elapsed(),
                });
            }
            Some(batch) => {
                info!("Resuming batch #{} ({})", batch.id, batch.status);
                self.db.update_batch_status(batch.id, BatchStatus::Scanning)?;
                batch
            }
            None => {
                let batch = self.db.create_batch(&source_str, &target_str, kind)?;
                info!("Created new batch #{}", batch.id);
                batch
            }
        };

        info!("Discovering {} files in {}...", kind, source.display());
        let paths = match walk::discover_media(&source, kind, &self.config.ignore_patterns) {
            Ok(paths) => paths,
            Err(e) => return Err(self.pause(batch.id, None, e)),
        };
        let discovered = paths.len();
        self.db.set_batch_total(batch.id, discovered as i64)?;
        info!("Found {} {} files to scan", discovered, kind);

        // The ledger keys files by their exact path text. A lossy conversion
        // could merge two distinct names into one row, so such files stay out.
        let mut candidates: Vec<(PathBuf, String)> = Vec::with_capacity(discovered);
        let mut invalid_paths = 0;
        for path in paths {
            match path.to_str().map(str::to_owned) {
                Some(text) => candidates.push((path, text)),
                None => {
                    warn!("Skipping {}: path is not valid UTF-8", path.display());
                    invalid_paths += 1;
                }
            }
        }

        let path_strings: Vec<String> = candidates.iter().map(|(_, s)| s.clone()).collect();
        let known = self.db.catalogued_paths(&path_strings)?;
        let to_process: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|(_, s)| !known.contains(s))
            .map(|(p, _)| p)
            .collect();
        let already_catalogued = discovered - invalid_paths - to_process.len();
        if already_catalogued > 0 {
            info!("Skipping {} already processed files", already_catalogued);
        }

        self.reporter.on_scan_start(discovered, already_catalogued);
        let mut progress =
            self.extract_and_flush(batch.id, to_process, already_catalogued, discovered, options);
        progress.failures += invalid_paths;

        if let Some(e) = progress.error {
            let checkpoint = progress.last_path.as_deref().map(|p| (p, progress.scanned));
            return Err(self.pause(batch.id, checkpoint, e));
        }
        if self.cancel.is_cancelled() {
            info!("Scan interrupted, progress saved");
            let checkpoint = progress.last_path.as_deref().map(|p| (p, progress.scanned));
            return Err(self.pause(batch.id, checkpoint, Error::Cancelled));
        }

        self.db.update_batch_counts(batch.id)?;
        self.db.update_batch_status(batch.id, BatchStatus::Scanned)?;
        let duration = started.elapsed();
        info!(
            "Scan complete: {} files processed, {} catalogued, {} failed",
            progress.scanned, progress.catalogued, progress.failures
        );
        self.reporter
            .on_scan_complete(progress.catalogued, duration.as_secs_f64());

        let batch = self
            .db
            .get_batch(batch.id)?
            .ok_or(Error::BatchNotFound(batch.id))?;
        Ok(ScanResult {
            batch,
            discovered,
            already_catalogued,
            catalogued: progress.catalogued,
            extraction_failures: progress.failures,
            duration,
        })
    }

    fn extract_and_flush(
        &self,
        batch_id: i64,
        files: Vec<PathBuf>,
        already_catalogued: usize,
        total: usize,
        options: &ScanOptions,
    ) -> Progress {
        let mut progress = Progress {
            scanned: already_catalogued,
            ..Progress::default()
        };
        if files.is_empty() {
            return progress;
        }

        let workers = options
            .workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| self.config.worker_count());
        let pool = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scan-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                progress.error = Some(e.into());
                return progress;
            }
        };
        info!("Processing {} files with {} workers...", files.len(), workers);

        let bulk_size = self.config.bulk_insert_size.max(1);
        let checkpoint = self.config.scan_checkpoint_interval.max(1);
        let mut buffer: Vec<NewMediaFile> = Vec::with_capacity(bulk_size);
        let (tx, rx) = crossbeam_channel::bounded::<(PathBuf, Option<NewMediaFile>)>(workers * 2);
        let halt = AtomicBool::new(false);
        let extractor: &dyn MetadataExtractor = &*self.extractor;
        let cancel = &self.cancel;
        let checksums = options.checksums;

        thread::scope(|s| {
            let halt = &halt;
            s.spawn(move || {
                pool.install(|| {
                    files.par_iter().for_each_with(tx, |tx, path| {
                        if halt.load(Ordering::Relaxed) || cancel.is_cancelled() {
                            return;
                        }
                        let record = catalog_entry(path, batch_id, extractor, checksums);
                        // The receiver only goes away once we are halting.
                        let _ = tx.send((path.clone(), record));
                    });
                });
            });

            for (path, record) in rx.iter() {
                progress.scanned += 1;
                match record {
                    Some(record) => buffer.push(record),
                    None => progress.failures += 1,
                }

                if buffer.len() >= bulk_size {
                    if let Err(e) = self.flush(&mut buffer, &mut progress.catalogued) {
                        error!("Bulk insert failed: {}", e);
                        progress.error = Some(e);
                        halt.store(true, Ordering::Relaxed);
                        break;
                    }
                }

                let path_str = path.to_string_lossy().into_owned();
                self.reporter
                    .on_scan_progress(progress.scanned, total, &path_str);
                if progress.scanned % checkpoint == 0 {
                    if let Err(e) =
                        self.db
                            .update_batch_progress(batch_id, progress.scanned as i64, &path_str)
                    {
                        error!("Failed to checkpoint batch #{}: {}", batch_id, e);
                        progress.error = Some(e.into());
                        halt.store(true, Ordering::Relaxed);
                        break;
                    }
                }
                progress.last_path = Some(path_str);
            }
            drop(rx);
        });

        if !buffer.is_empty() {
            if let Err(e) = self.flush(&mut buffer, &mut progress.catalogued) {
                error!("Final flush failed, {} results lost: {}", buffer.len(), e);
                if progress.error.is_none() {
                    progress.error = Some(e);
                }
            }
        }
        progress
    }

    fn flush(&self, buffer: &mut Vec<NewMediaFile>, catalogued: &mut usize) -> Result<(), Error> {
        let inserted = self.db.insert_files_bulk(buffer)?;
        *catalogued += inserted;
        buffer.clear();
        Ok(())
    }

    /// Best-effort bookkeeping before a scan error reaches the caller.
    fn pause(&self, batch_id: i64, checkpoint: Option<(&str, usize)>, cause: Error) -> Error {
        if let Some((last_path, scanned)) = checkpoint {
            if let Err(e) = self
                .db
                .update_batch_progress(batch_id, scanned as i64, last_path)
            {
                error!("Failed to save checkpoint for batch #{}: {}", batch_id, e);
            }
        }
        if let Err(e) = self.db.update_batch_counts(batch_id) {
            error!("Failed to recompute counts for batch #{}: {}", batch_id, e);
        }
        if let Err(e) = self.db.update_batch_status(batch_id, BatchStatus::Paused) {
            error!("Failed to pause batch #{}: {}", batch_id, e);
        }
        warn!("Batch #{} paused: {}", batch_id, cause);
        cause
    }
}

fn resolve_source(source_root: &Path) -> Result<PathBuf, Error> {
    match fs::canonicalize(source_root) {
        Ok(path) if path.is_dir() => Ok(path),
        Ok(path) => Err(Error::NotADirectory(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(Error::SourceNotFound(source_root.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn utf8_path(path: &Path) -> Result<String, Error> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

/// Per-file extraction. Failures are logged and dropped; the file will be
/// picked up by a later scan.
fn catalog_entry(
    path: &Path,
    batch_id: i64,
    extractor: &dyn MetadataExtractor,
    checksums: bool,
) -> Option<NewMediaFile> {
    match build_entry(path, batch_id, extractor, checksums) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Failed to process {}: {}", path.display(), e);
            None
        }
    }
}

fn build_entry(
    path: &Path,
    batch_id: i64,
    extractor: &dyn MetadataExtractor,
    checksums: bool,
) -> io::Result<NewMediaFile> {
    let source_path = path
        .to_str()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"))?;
    let metadata = fs::metadata(path)?;
    let (created_at, modified_at) = platform::file_dates(path)?;
    let extracted = extractor.extract(path, checksums);
    debug!("Extracted {} -> {:?}", path.display(), extracted.date);

    Ok(NewMediaFile {
        batch_id,
        source_path: source_path.to_string(),
        filename: path
            .file_name()
            .and_then(|f| f.to_str())
            .map(str::to_owned)
            .unwrap_or_default(),
        file_size: metadata.len() as i64,
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
        extracted_date: extracted.date,
        created_at,
        modified_at,
        scanned_at: chrono::Local::now().naive_local(),
        checksum: extracted.checksum,
    })
}
