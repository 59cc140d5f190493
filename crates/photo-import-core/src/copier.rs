use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::ImportConfig;
use crate::error::Error;
use crate::placement;
use crate::progress::{CancelToken, ProgressReporter};
use crate::storage::models::{Batch, BatchStatus, FileStatus, MediaFile};
use crate::storage::Database;

const MISSING_SOURCE: &str = "Source file no longer exists";
const NO_EXTRACTED_DATE: &str = "No extracted date available";

/// Policy knobs for a copy pass.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Mark files without an extracted date as skipped instead of placing them.
    pub skip_if_no_date: bool,
    /// Prefer the filesystem creation date over the modification date when no
    /// date was extracted.
    pub use_filesystem_date_fallback: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            skip_if_no_date: false,
            use_filesystem_date_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyStats {
    pub total: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Copied,
    Skipped,
    Failed,
}

/// Sequential copy phase over the pending files of a batch.
pub struct Copier<'a> {
    db: &'a Database,
    config: &'a ImportConfig,
    options: CopyOptions,
    reporter: &'a dyn ProgressReporter,
    cancel: CancelToken,
}

impl<'a> Copier<'a> {
    pub fn new(
        db: &'a Database,
        config: &'a ImportConfig,
        options: CopyOptions,
        reporter: &'a dyn ProgressReporter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            db,
            config,
            options,
            reporter,
            cancel,
        }
    }

    /// Copy every pending file of the batch into its date folder.
    ///
    /// A dry run records the placements without touching the filesystem.
    pub fn copy(&self, batch_id: i64, dry_run: bool) -> Result<CopyStats, Error> {
        let batch = self.eligible_batch(batch_id)?;
        self.db.update_batch_status(batch_id, BatchStatus::Copying)?;

        match self.run(&batch, dry_run) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                match e {
                    Error::Cancelled => info!("Copy interrupted by user"),
                    _ => error!("Copy failed: {}", e),
                }
                if let Err(count_err) = self.db.update_batch_counts(batch_id) {
                    error!("Failed to recompute counts for batch #{}: {}", batch_id, count_err);
                }
                if let Err(pause_err) = self.db.update_batch_status(batch_id, BatchStatus::Paused) {
                    error!("Failed to pause batch #{}: {}", batch_id, pause_err);
                }
                Err(e)
            }
        }
    }

    /// Reset every failed file of the batch to pending and run another pass.
    pub fn retry_failed(&self, batch_id: i64) -> Result<CopyStats, Error> {
        self.eligible_batch(batch_id)?;
        let reset = self.db.reset_failed_files(batch_id)?;
        info!("Reset {} failed files to pending", reset);
        self.copy(batch_id, false)
    }

    fn eligible_batch(&self, batch_id: i64) -> Result<Batch, Error> {
        let batch = self
            .db
            .get_batch(batch_id)?
            .ok_or(Error::BatchNotFound(batch_id))?;
        if !batch.status.is_copy_eligible() {
            return Err(Error::InvalidState {
                batch_id,
                status: batch.status,
            });
        }
        Ok(batch)
    }

    fn run(&self, batch: &Batch, dry_run: bool) -> Result<CopyStats, Error> {
        let started = Instant::now();
        let target_root = PathBuf::from(&batch.target_root);
        let interval = self.config.copy_count_interval.max(1);

        let pending = self.db.get_pending_files(batch.id, None)?;
        let mut stats = CopyStats {
            total: pending.len(),
            ..CopyStats::default()
        };
        info!("Starting copy of {} files", stats.total);
        self.reporter.on_copy_start(stats.total);

        // Placements handed out during this pass; a dry run writes nothing, so
        // the disk alone cannot tell us which names are already claimed.
        let mut assigned: HashSet<PathBuf> = HashSet::new();

        for (i, file) in pending.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.copy_file(file, &target_root, dry_run, &mut assigned)? {
                Outcome::Copied => stats.copied += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Failed => stats.failed += 1,
            }

            self.reporter
                .on_copy_progress(i + 1, stats.total, &file.source_path);
            if (i + 1) % interval == 0 {
                self.db.update_batch_counts(batch.id)?;
            }
        }

        self.db.update_batch_counts(batch.id)?;
        let remaining = self.db.count_pending(batch.id)?;
        if remaining == 0 {
            self.db.update_batch_status(batch.id, BatchStatus::Completed)?;
            info!("Batch #{} completed", batch.id);
        } else {
            info!("{} files still pending in batch #{}", remaining, batch.id);
        }

        stats.duration = started.elapsed();
        self.reporter
            .on_copy_complete(stats.copied, stats.failed, stats.duration.as_secs_f64());
        Ok(stats)
    }

    /// One file through the state machine. Only ledger failures escape.
    fn copy_file(
        &self,
        file: &MediaFile,
        target_root: &Path,
        dry_run: bool,
        assigned: &mut HashSet<PathBuf>,
    ) -> Result<Outcome, Error> {
        let source = Path::new(&file.source_path);

        if !source.exists() {
            warn!("{}: {}", MISSING_SOURCE, source.display());
            self.db
                .update_file_status(file.id, FileStatus::Failed, None, Some(MISSING_SOURCE))?;
            return Ok(Outcome::Failed);
        }

        if self.options.skip_if_no_date && file.extracted_date.is_none() {
            self.db.update_file_status(
                file.id,
                FileStatus::Skipped,
                None,
                Some(NO_EXTRACTED_DATE),
            )?;
            return Ok(Outcome::Skipped);
        }

        let target = placement::resolve_conflict(
            placement::target_path(target_root, file, self.options.use_filesystem_date_fallback),
            |p| assigned.contains(p) || p.exists(),
        );
        let target_str = target.to_string_lossy().into_owned();

        if dry_run {
            info!("[DRY RUN] Would copy: {} -> {}", source.display(), target.display());
        } else if let Err(e) = copy_preserving(source, &target) {
            warn!("Copy failed for {}: {}", source.display(), e);
            let message = format!("Copy failed: {e}");
            self.db
                .update_file_status(file.id, FileStatus::Failed, None, Some(&message))?;
            return Ok(Outcome::Failed);
        } else {
            debug!("Copied: {} -> {}", source.display(), target.display());
        }

        self.db
            .update_file_status(file.id, FileStatus::Copied, Some(&target_str), None)?;
        assigned.insert(target);
        Ok(Outcome::Copied)
    }
}

/// Copy contents and permissions, then carry over access and modification
/// times. A failed copy leaves no partial target behind.
fn copy_preserving(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::copy(source, target) {
        if target.exists() {
            let _ = fs::remove_file(target);
        }
        return Err(e);
    }
    if let Err(e) = preserve_times(source, target) {
        warn!("Could not preserve timestamps on {}: {}", target.display(), e);
    }
    Ok(())
}

fn preserve_times(source: &Path, target: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    // Read-only sources produce read-only copies; a read handle is enough
    // to set times on unix.
    let handle = File::options()
        .write(true)
        .open(target)
        .or_else(|_| File::open(target))?;
    handle.set_times(times)
}
