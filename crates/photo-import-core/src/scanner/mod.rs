mod scan;
pub mod walk;

pub use scan::{ScanOptions, ScanResult, Scanner};
pub use walk::discover_media;
