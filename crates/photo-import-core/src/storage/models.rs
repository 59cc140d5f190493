use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::media::MediaKind;

/// Lifecycle of a batch.
///
/// `scanning -> scanned -> copying -> completed`, with `paused` reachable from
/// `scanning` and `copying` on interruption and `failed` as a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    Scanning,
    Scanned,
    Copying,
    Completed,
    Failed,
    Paused,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 6] = [
        BatchStatus::Scanning,
        BatchStatus::Scanned,
        BatchStatus::Copying,
        BatchStatus::Completed,
        BatchStatus::Failed,
        BatchStatus::Paused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Scanning => "scanning",
            BatchStatus::Scanned => "scanned",
            BatchStatus::Copying => "copying",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Paused => "paused",
        }
    }

    /// Active batches are the ones a new scan of the same root resumes.
    pub fn is_active(self) -> bool {
        !matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    /// `completed` is included so a retry after completion can run another pass.
    pub fn is_copy_eligible(self) -> bool {
        matches!(
            self,
            BatchStatus::Scanned
                | BatchStatus::Copying
                | BatchStatus::Paused
                | BatchStatus::Completed
        )
    }
}

/// Lifecycle of a catalogued file: `pending -> copied | failed | skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Pending,
    Copied,
    Failed,
    Skipped,
}

impl FileStatus {
    pub const ALL: [FileStatus; 4] = [
        FileStatus::Pending,
        FileStatus::Copied,
        FileStatus::Failed,
        FileStatus::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Copied => "copied",
            FileStatus::Failed => "failed",
            FileStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

macro_rules! text_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownStatus(s.to_string()))
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(BatchStatus);
text_enum!(FileStatus);
text_enum!(MediaKind);

/// One scan-then-copy run over a source/target directory pair.
///
/// The counters are a cache of the `media_file` rows and are recomputed by
/// [`Database::update_batch_counts`](crate::storage::Database::update_batch_counts).
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: i64,
    pub source_root: String,
    pub target_root: String,
    pub media_kind: MediaKind,
    pub status: BatchStatus,
    pub total_files: i64,
    pub scanned_files: i64,
    pub copied_files: i64,
    pub failed_files: i64,
    pub skipped_files: i64,
    pub started_at: NaiveDateTime,
    pub scan_completed_at: Option<NaiveDateTime>,
    pub copy_started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub last_processed_path: Option<String>,
}

/// A catalogued source file.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub id: i64,
    pub batch_id: i64,
    pub source_path: String,
    pub filename: String,
    pub file_size: i64,
    pub extension: String,
    pub extracted_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub target_path: Option<String>,
    pub status: FileStatus,
    pub error_message: Option<String>,
    pub scanned_at: NaiveDateTime,
    pub copied_at: Option<NaiveDateTime>,
    pub checksum: Option<String>,
}

/// Aggregates computed directly from the file rows of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: i64,
    pub pending: i64,
    pub copied: i64,
    pub failed: i64,
    pub skipped: i64,
    pub with_extracted_date: i64,
    pub total_size: i64,
}
