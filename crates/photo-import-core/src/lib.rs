pub mod config;
pub mod copier;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod media;
pub mod placement;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::ImportConfig;
pub use copier::{CopyOptions, CopyStats, Copier};
pub use engine::ImportEngine;
pub use error::Error;
pub use media::{MediaKind, MetadataExtractor};
pub use progress::{CancelToken, ProgressReporter, SilentReporter};
pub use scanner::{ScanOptions, ScanResult, Scanner};
pub use storage::models::{Batch, BatchStats, BatchStatus, FileStatus, MediaFile};
pub use storage::Database;
