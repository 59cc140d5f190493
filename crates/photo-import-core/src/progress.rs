use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for reporting scan and copy progress.
///
/// The CLI implements it with indicatif bars. Every method has a no-op
/// default and the values passed are purely observational.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _total_files: usize, _already_catalogued: usize) {}
    fn on_scan_progress(&self, _scanned: usize, _total_files: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _catalogued: usize, _duration_secs: f64) {}
    fn on_copy_start(&self, _total_files: usize) {}
    fn on_copy_progress(&self, _processed: usize, _total_files: usize, _current_path: &str) {}
    fn on_copy_complete(&self, _copied: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Shared interrupt flag. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous interrupt so the next operation can run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        other.reset();
        assert!(!token.is_cancelled());
    }
}
