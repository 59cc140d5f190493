mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use photo_import_core::{
    config, CopyOptions, Error, FileStatus, ImportEngine, ScanOptions,
};
use progress::CliReporter;
use tracing::{error, info};

const FAILED_FILES_SHOWN: i64 = 20;

fn main() {
    dotenv().ok();
    let args = Cli::parse();
    let guard = logging::init_logger(args.verbose);

    let code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            match err.downcast_ref::<Error>() {
                Some(Error::Cancelled) => eprintln!(
                    "{}",
                    "Interrupted. Progress saved; run the same command again to resume.".yellow()
                ),
                _ => error!("Error: {:#}", err),
            }
            1
        }
    };

    // Flush the file appender before exiting.
    drop(guard);
    process::exit(code);
}

fn run(args: Cli) -> Result<()> {
    let mut config = config::load_configuration().context("Error loading configuration")?;
    if let Some(db) = &args.db {
        config.database_path = db.to_string_lossy().into_owned();
    }

    let Some(command) = args.command else {
        Cli::command().print_long_help()?;
        return Ok(());
    };

    let engine = ImportEngine::new(config, args.media.into())?;
    let cancel = engine.cancel_token();
    ctrlc::set_handler(move || cancel.cancel()).context("Failed to install Ctrl-C handler")?;

    match command {
        Commands::Scan {
            source,
            target,
            no_checksum,
            no_resume,
            workers,
        } => {
            let options = ScanOptions {
                checksums: !no_checksum,
                resume: !no_resume,
                workers,
            };
            run_scan(&engine, &source, &target, &options)
        }
        Commands::Copy {
            batch,
            dry_run,
            skip_no_date,
            no_file_date,
        } => {
            let options = CopyOptions {
                skip_if_no_date: skip_no_date,
                use_filesystem_date_fallback: !no_file_date,
            };
            run_copy(&engine, batch, dry_run, &options)
        }
        Commands::Status { batch, show_failed } => run_status(&engine, batch, show_failed),
        Commands::Retry { batch } => run_retry(&engine, batch),
        Commands::List { limit } => run_list(&engine, limit),
    }
}

fn run_scan(engine: &ImportEngine, source: &Path, target: &Path, options: &ScanOptions) -> Result<()> {
    info!(
        "Scanning {} for {} files",
        source.display(),
        engine.media_kind()
    );
    let reporter = CliReporter::new();
    let result = engine.scan(source, target, options, &reporter)?;
    drop(reporter);

    println!();
    println!(
        "Batch {} is {}",
        format!("#{}", result.batch.id).cyan(),
        result.batch.status.to_string().green()
    );
    println!(
        "  {} discovered, {} already catalogued, {} newly catalogued, {} failed extraction",
        result.discovered,
        result.already_catalogued,
        format!("{}", result.catalogued).green(),
        format!("{}", result.extraction_failures).red(),
    );
    println!("  Took {:.2}s", result.duration.as_secs_f64());
    println!();
    println!("Next: photo-import copy -b {}", result.batch.id);
    Ok(())
}

fn run_copy(
    engine: &ImportEngine,
    batch_id: Option<i64>,
    dry_run: bool,
    options: &CopyOptions,
) -> Result<()> {
    if dry_run {
        println!("{}", "DRY RUN: no files will be written".yellow());
    }
    let reporter = CliReporter::new();
    let stats = engine.copy(batch_id, dry_run, options, &reporter)?;
    drop(reporter);

    println!();
    println!(
        "{} copied, {} skipped, {} failed of {} pending in {:.2}s",
        format!("{}", stats.copied).green(),
        format!("{}", stats.skipped).yellow(),
        format!("{}", stats.failed).red(),
        stats.total,
        stats.duration.as_secs_f64(),
    );
    if stats.failed > 0 {
        println!("Run `photo-import status --show-failed` to see what went wrong.");
    }
    Ok(())
}

fn run_retry(engine: &ImportEngine, batch_id: i64) -> Result<()> {
    let reporter = CliReporter::new();
    let stats = engine.retry_failed(Some(batch_id), &CopyOptions::default(), &reporter)?;
    drop(reporter);

    println!();
    println!(
        "Retry finished: {} copied, {} still failing",
        format!("{}", stats.copied).green(),
        format!("{}", stats.failed).red(),
    );
    Ok(())
}

fn run_status(engine: &ImportEngine, batch_id: Option<i64>, show_failed: bool) -> Result<()> {
    let batch = engine.get_batch(batch_id)?;
    let stats = engine.get_batch_stats(batch.id)?;

    println!(
        "Batch {} ({}) {}",
        format!("#{}", batch.id).cyan(),
        batch.media_kind,
        batch.status.to_string().bold()
    );
    println!("  Source:         {}", batch.source_root);
    println!("  Target:         {}", batch.target_root);
    println!("  Started:        {}", format_time(Some(batch.started_at)));
    println!("  Scan completed: {}", format_time(batch.scan_completed_at));
    println!("  Copy started:   {}", format_time(batch.copy_started_at));
    println!("  Completed:      {}", format_time(batch.completed_at));
    if let Some(last) = &batch.last_processed_path {
        println!("  Last scanned:   {}", last);
    }
    println!();
    println!("  Files:          {} ({})", stats.total, format_size(stats.total_size));
    println!("  With date:      {}", stats.with_extracted_date);
    println!("  Pending:        {}", stats.pending);
    println!("  Copied:         {}", format!("{}", stats.copied).green());
    println!("  Skipped:        {}", format!("{}", stats.skipped).yellow());
    println!("  Failed:         {}", format!("{}", stats.failed).red());

    if show_failed && stats.failed > 0 {
        println!();
        println!("Failed files:");
        let failed =
            engine.get_files_by_status(batch.id, FileStatus::Failed, Some(FAILED_FILES_SHOWN))?;
        for file in &failed {
            println!(
                "  {} {}",
                file.source_path,
                file.error_message.as_deref().unwrap_or("").red()
            );
        }
        if stats.failed > FAILED_FILES_SHOWN {
            println!("  ... and {} more", stats.failed - FAILED_FILES_SHOWN);
        }
    }
    Ok(())
}

fn run_list(engine: &ImportEngine, limit: i64) -> Result<()> {
    let batches = engine.list_batches(limit)?;
    if batches.is_empty() {
        println!("No batches yet.");
        return Ok(());
    }
    for batch in &batches {
        println!(
            "{:>5}  {:<6} {:<10} {:>7} files  {:>7} copied  {}  {}",
            format!("#{}", batch.id).cyan(),
            batch.media_kind.to_string(),
            batch.status.to_string(),
            batch.total_files,
            batch.copied_files,
            format_time(Some(batch.started_at)),
            batch.source_root,
        );
    }
    Ok(())
}

fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
