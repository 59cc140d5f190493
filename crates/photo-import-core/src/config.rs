use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

/// Upper bound on the derived worker count.
const MAX_DEFAULT_WORKERS: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    pub database_path: String,
    /// Scan worker count. `None` derives it from host parallelism.
    pub workers: Option<usize>,
    pub bulk_insert_size: usize,
    pub scan_checkpoint_interval: usize,
    pub copy_count_interval: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            database_path: "photo_import.db".to_string(),
            workers: None,
            bulk_insert_size: 500,
            scan_checkpoint_interval: 500,
            copy_count_interval: 50,
            ignore_patterns: Vec::new(),
        }
    }
}

impl ImportConfig {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => default_workers(),
        }
    }
}

/// Scanning is I/O bound, so the pool is wider than the core count.
pub fn default_workers() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (parallelism * 4).min(MAX_DEFAULT_WORKERS)
}

/// Defaults, then `PhotoImport.toml` if present, then `PHOTO_IMPORT_*` env vars.
pub fn load_configuration() -> Result<ImportConfig, ConfigError> {
    let defaults = ImportConfig::default();
    let builder = Config::builder()
        .set_default("database_path", defaults.database_path)?
        .set_default("bulk_insert_size", defaults.bulk_insert_size as i64)?
        .set_default(
            "scan_checkpoint_interval",
            defaults.scan_checkpoint_interval as i64,
        )?
        .set_default("copy_count_interval", defaults.copy_count_interval as i64)?
        .set_default("ignore_patterns", Vec::<String>::new())?
        .add_source(ConfigFile::with_name("PhotoImport").required(false))
        .add_source(Environment::with_prefix("PHOTO_IMPORT"))
        .build()?;
    builder.try_deserialize::<ImportConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_is_bounded() {
        let n = default_workers();
        assert!(n >= 4);
        assert!(n <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_explicit_worker_count_wins() {
        let config = ImportConfig {
            workers: Some(3),
            ..ImportConfig::default()
        };
        assert_eq!(config.worker_count(), 3);

        let zero = ImportConfig {
            workers: Some(0),
            ..ImportConfig::default()
        };
        assert_eq!(zero.worker_count(), default_workers());
    }

    #[test]
    fn test_load_configuration_defaults() {
        let config = load_configuration().unwrap();
        assert_eq!(config.bulk_insert_size, 500);
        assert_eq!(config.copy_count_interval, 50);
        assert!(config.ignore_patterns.is_empty());
    }
}
