use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Result, Row};
use tracing::debug;

use super::models::*;
use super::sqlite::Database;
use crate::media::MediaKind;

const BATCH_COLUMNS: &str = "id, source_root, target_root, media_kind, status, total_files, \
     scanned_files, copied_files, failed_files, skipped_files, started_at, scan_completed_at, \
     copy_started_at, completed_at, last_processed_path";

const FILE_COLUMNS: &str = "id, batch_id, source_path, filename, file_size, extension, \
     extracted_date, created_at, modified_at, target_path, status, error_message, scanned_at, \
     copied_at, checksum";

const STATS_QUERY: &str = "SELECT COUNT(*), \
        COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0), \
        COALESCE(SUM(CASE WHEN status = 'copied' THEN 1 ELSE 0 END), 0), \
        COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0), \
        COALESCE(SUM(CASE WHEN status = 'skipped' THEN 1 ELSE 0 END), 0), \
        COALESCE(SUM(CASE WHEN extracted_date IS NOT NULL THEN 1 ELSE 0 END), 0), \
        COALESCE(SUM(file_size), 0) \
     FROM media_file WHERE batch_id = ?1";

/// A scan result ready to be catalogued.
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub batch_id: i64,
    pub source_path: String,
    pub filename: String,
    pub file_size: i64,
    pub extension: String,
    pub extracted_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub scanned_at: NaiveDateTime,
    pub checksum: Option<String>,
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn batch_from_row(row: &Row<'_>) -> Result<Batch> {
    Ok(Batch {
        id: row.get(0)?,
        source_root: row.get(1)?,
        target_root: row.get(2)?,
        media_kind: row.get(3)?,
        status: row.get(4)?,
        total_files: row.get(5)?,
        scanned_files: row.get(6)?,
        copied_files: row.get(7)?,
        failed_files: row.get(8)?,
        skipped_files: row.get(9)?,
        started_at: row.get(10)?,
        scan_completed_at: row.get(11)?,
        copy_started_at: row.get(12)?,
        completed_at: row.get(13)?,
        last_processed_path: row.get(14)?,
    })
}

fn file_from_row(row: &Row<'_>) -> Result<MediaFile> {
    Ok(MediaFile {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        source_path: row.get(2)?,
        filename: row.get(3)?,
        file_size: row.get(4)?,
        extension: row.get(5)?,
        extracted_date: row.get(6)?,
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
        target_path: row.get(9)?,
        status: row.get(10)?,
        error_message: row.get(11)?,
        scanned_at: row.get(12)?,
        copied_at: row.get(13)?,
        checksum: row.get(14)?,
    })
}

fn stats_from_row(row: &Row<'_>) -> Result<BatchStats> {
    Ok(BatchStats {
        total: row.get(0)?,
        pending: row.get(1)?,
        copied: row.get(2)?,
        failed: row.get(3)?,
        skipped: row.get(4)?,
        with_extracted_date: row.get(5)?,
        total_size: row.get(6)?,
    })
}

impl Database {
    // ── Batches ──────────────────────────────────────────────────

    pub fn create_batch(
        &self,
        source_root: &str,
        target_root: &str,
        media_kind: MediaKind,
    ) -> Result<Batch> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO batch (source_root, target_root, media_kind, status, started_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source_root,
                target_root,
                media_kind,
                BatchStatus::Scanning,
                now()
            ],
        )?;
        let id = tx.last_insert_rowid();
        let batch = tx.query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM batch WHERE id = ?1"),
            params![id],
            batch_from_row,
        )?;
        tx.commit()?;
        debug!("Created batch {} for {}", id, source_root);
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>> {
        self.connection()
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM batch WHERE id = ?1"),
                params![batch_id],
                batch_from_row,
            )
            .optional()
    }

    pub fn get_latest_batch(&self) -> Result<Option<Batch>> {
        self.connection()
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM batch ORDER BY id DESC LIMIT 1"),
                [],
                batch_from_row,
            )
            .optional()
    }

    /// Most recent batch for the root that is neither completed nor failed.
    ///
    /// Assumes a single writer per source root.
    pub fn get_active_batch(
        &self,
        source_root: &str,
        media_kind: MediaKind,
    ) -> Result<Option<Batch>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {BATCH_COLUMNS} FROM batch \
                     WHERE source_root = ?1 AND media_kind = ?2 AND status NOT IN (?3, ?4) \
                     ORDER BY id DESC LIMIT 1"
                ),
                params![
                    source_root,
                    media_kind,
                    BatchStatus::Completed,
                    BatchStatus::Failed
                ],
                batch_from_row,
            )
            .optional()
    }

    /// Recent batches, newest first.
    pub fn list_batches(&self, limit: i64) -> Result<Vec<Batch>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM batch ORDER BY id DESC LIMIT ?1"
        ))?;
        let batches = stmt
            .query_map(params![limit], batch_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(batches)
    }

    /// Set the status and, for `scanned`/`copying`/`completed`, the matching
    /// timestamp in the same statement.
    pub fn update_batch_status(&self, batch_id: i64, status: BatchStatus) -> Result<()> {
        let stamp_column = match status {
            BatchStatus::Scanned => Some("scan_completed_at"),
            BatchStatus::Copying => Some("copy_started_at"),
            BatchStatus::Completed => Some("completed_at"),
            _ => None,
        };
        let tx = self.connection().unchecked_transaction()?;
        match stamp_column {
            Some(column) => tx.execute(
                &format!("UPDATE batch SET status = ?1, {column} = ?2 WHERE id = ?3"),
                params![status, now(), batch_id],
            )?,
            None => tx.execute(
                "UPDATE batch SET status = ?1 WHERE id = ?2",
                params![status, batch_id],
            )?,
        };
        tx.commit()?;
        debug!("Batch {} -> {}", batch_id, status);
        Ok(())
    }

    pub fn set_batch_total(&self, batch_id: i64, total_files: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE batch SET total_files = ?1 WHERE id = ?2",
            params![total_files, batch_id],
        )?;
        Ok(())
    }

    /// Resume checkpoint written periodically during a scan.
    pub fn update_batch_progress(
        &self,
        batch_id: i64,
        scanned_files: i64,
        last_processed_path: &str,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE batch SET scanned_files = ?1, last_processed_path = ?2 WHERE id = ?3",
            params![scanned_files, last_processed_path, batch_id],
        )?;
        Ok(())
    }

    /// Recompute the cached counters from the file rows.
    pub fn update_batch_counts(&self, batch_id: i64) -> Result<BatchStats> {
        let tx = self.connection().unchecked_transaction()?;
        let stats = tx.query_row(STATS_QUERY, params![batch_id], stats_from_row)?;
        tx.execute(
            "UPDATE batch SET total_files = ?1, scanned_files = ?1, copied_files = ?2, \
             failed_files = ?3, skipped_files = ?4 WHERE id = ?5",
            params![
                stats.total,
                stats.copied,
                stats.failed,
                stats.skipped,
                batch_id
            ],
        )?;
        tx.commit()?;
        Ok(stats)
    }

    pub fn get_batch_stats(&self, batch_id: i64) -> Result<BatchStats> {
        self.connection()
            .query_row(STATS_QUERY, params![batch_id], stats_from_row)
    }

    // ── Files ────────────────────────────────────────────────────

    /// Bulk insert in one transaction. Paths already catalogued (in any batch)
    /// are ignored; returns the number of rows actually inserted.
    pub fn insert_files_bulk(&self, files: &[NewMediaFile]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO media_file \
                 (batch_id, source_path, filename, file_size, extension, extracted_date, \
                  created_at, modified_at, status, scanned_at, checksum) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                 ON CONFLICT(source_path) DO NOTHING",
            )?;
            for file in files {
                count += stmt.execute(params![
                    file.batch_id,
                    file.source_path,
                    file.filename,
                    file.file_size,
                    file.extension,
                    file.extracted_date,
                    file.created_at,
                    file.modified_at,
                    FileStatus::Pending,
                    file.scanned_at,
                    file.checksum,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} of {} media files", count, files.len());
        Ok(count)
    }

    pub fn file_exists(&self, source_path: &str) -> Result<bool> {
        self.connection()
            .query_row(
                "SELECT 1 FROM media_file WHERE source_path = ?1",
                params![source_path],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
    }

    /// The subset of `paths` that already has a row.
    pub fn catalogued_paths(&self, paths: &[String]) -> Result<HashSet<String>> {
        let mut stmt = self
            .connection()
            .prepare_cached("SELECT 1 FROM media_file WHERE source_path = ?1")?;
        let mut found = HashSet::new();
        for path in paths {
            if stmt.exists(params![path])? {
                found.insert(path.clone());
            }
        }
        Ok(found)
    }

    pub fn get_file(&self, file_id: i64) -> Result<Option<MediaFile>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM media_file WHERE id = ?1"),
                params![file_id],
                file_from_row,
            )
            .optional()
    }

    pub fn get_file_by_path(&self, source_path: &str) -> Result<Option<MediaFile>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM media_file WHERE source_path = ?1"),
                params![source_path],
                file_from_row,
            )
            .optional()
    }

    /// Files of a batch in one status, ordered by source path.
    pub fn get_files_by_status(
        &self,
        batch_id: i64,
        status: FileStatus,
        limit: Option<i64>,
    ) -> Result<Vec<MediaFile>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {FILE_COLUMNS} FROM media_file \
             WHERE batch_id = ?1 AND status = ?2 \
             ORDER BY source_path LIMIT ?3"
        ))?;
        // SQLite treats a negative LIMIT as unbounded
        let files = stmt
            .query_map(params![batch_id, status, limit.unwrap_or(-1)], file_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn get_pending_files(&self, batch_id: i64, limit: Option<i64>) -> Result<Vec<MediaFile>> {
        self.get_files_by_status(batch_id, FileStatus::Pending, limit)
    }

    pub fn count_pending(&self, batch_id: i64) -> Result<i64> {
        self.connection().query_row(
            "SELECT COUNT(*) FROM media_file WHERE batch_id = ?1 AND status = ?2",
            params![batch_id, FileStatus::Pending],
            |row| row.get(0),
        )
    }

    /// Record a file transition. `target_path` and `error_message` are kept
    /// when `None`; moving to `copied` stamps `copied_at` and clears the error.
    pub fn update_file_status(
        &self,
        file_id: i64,
        status: FileStatus,
        target_path: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let copied = status == FileStatus::Copied;
        let copied_at = copied.then(now);
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "UPDATE media_file SET status = ?1, \
                 target_path = COALESCE(?2, target_path), \
                 error_message = CASE WHEN ?3 THEN NULL ELSE COALESCE(?4, error_message) END, \
                 copied_at = COALESCE(?5, copied_at) \
             WHERE id = ?6",
            params![status, target_path, copied, error_message, copied_at, file_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Move every failed file of the batch back to pending.
    pub fn reset_failed_files(&self, batch_id: i64) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let count = tx.execute(
            "UPDATE media_file SET status = ?1, error_message = NULL \
             WHERE batch_id = ?2 AND status = ?3",
            params![FileStatus::Pending, batch_id, FileStatus::Failed],
        )?;
        tx.commit()?;
        debug!("Reset {} failed files in batch {}", count, batch_id);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_rejected_on_read() {
        let db = Database::open_in_memory().unwrap();
        let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
        db.connection()
            .execute(
                "UPDATE batch SET status = 'bogus' WHERE id = ?1",
                params![batch.id],
            )
            .unwrap();
        assert!(db.get_batch(batch.id).is_err());
    }
}
