use std::path::PathBuf;

use thiserror::Error;

use crate::storage::models::BatchStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Batch {0} not found")]
    BatchNotFound(i64),

    #[error("No batches found, run a scan first")]
    NoBatches,

    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Source is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Batch {batch_id} is in status {status}, cannot copy")]
    InvalidState { batch_id: i64, status: BatchStatus },

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Operation cancelled")]
    Cancelled,
}
