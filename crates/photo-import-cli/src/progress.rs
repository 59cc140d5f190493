use std::sync::Mutex;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use photo_import_core::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// Both phases know their totals up front, so each gets a counted bar.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, label: &str, total: usize, position: usize) {
        let style = ProgressStyle::with_template(&format!(
            "  {{spinner:.cyan}} {label} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{eta}} remaining)"
        ))
        .map(|style| style.progress_chars("━╸─").tick_chars(TICK_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.set_position(position as u64);
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn advance(&self, position: usize, total: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(total as u64) {
                    pb.set_length(total as u64);
                }
                pb.set_position(position as u64);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        self.finish_bar();
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, total_files: usize, already_catalogued: usize) {
        self.start_bar("Scanning", total_files, already_catalogued);
    }

    fn on_scan_progress(&self, scanned: usize, total_files: usize, _current_path: &str) {
        self.advance(scanned, total_files);
    }

    fn on_scan_complete(&self, catalogued: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} files catalogued in {:.2}s",
            "✓".green(),
            catalogued,
            duration_secs
        );
    }

    fn on_copy_start(&self, total_files: usize) {
        self.start_bar("Copying", total_files, 0);
    }

    fn on_copy_progress(&self, processed: usize, total_files: usize, _current_path: &str) {
        self.advance(processed, total_files);
    }

    fn on_copy_complete(&self, copied: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Copy complete: {} copied, {} failed in {:.2}s",
            "✓".green(),
            copied,
            failed,
            duration_secs
        );
    }
}
