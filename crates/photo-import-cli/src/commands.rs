use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use photo_import_core::MediaKind;

#[derive(Debug, Parser)]
#[command(name = "photo-import")]
#[command(about = "Resumable photo and video import into dated folders", long_about = None)]
pub struct Cli {
    /// Ledger database path (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Which kind of media to import
    #[arg(long, value_enum, default_value_t = Media::Photo, global = true)]
    pub media: Media,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Media {
    Photo,
    Video,
}

impl From<Media> for MediaKind {
    fn from(media: Media) -> Self {
        match media {
            Media::Photo => MediaKind::Photo,
            Media::Video => MediaKind::Video,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Catalogue a source tree into a batch (resumes an interrupted scan)
    Scan {
        source: PathBuf,
        target: PathBuf,
        /// Skip content checksums
        #[arg(long)]
        no_checksum: bool,
        /// Always open a new batch
        #[arg(long)]
        no_resume: bool,
        /// Scan worker count
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Copy pending files of a batch into dated folders
    Copy {
        /// Batch id (defaults to the latest batch)
        #[arg(short, long)]
        batch: Option<i64>,
        /// Record placements without writing any files
        #[arg(long)]
        dry_run: bool,
        /// Skip files without an extracted date
        #[arg(long)]
        skip_no_date: bool,
        /// Place undated files by modification date instead of creation date
        #[arg(long)]
        no_file_date: bool,
    },
    /// Show batch progress and statistics
    Status {
        #[arg(short, long)]
        batch: Option<i64>,
        /// List failed files with their errors
        #[arg(long)]
        show_failed: bool,
    },
    /// Reset failed files to pending and copy them again
    Retry {
        #[arg(short, long)]
        batch: i64,
    },
    /// List recent batches
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}
