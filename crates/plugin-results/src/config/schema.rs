use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; defaults to `~/.plugin-results/data/results.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Root under which plugin artifact directories live.
    pub output_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn new(output_directory: &str) -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            output_directory: output_directory.to_string(),
            worker_count: default_worker_count(),
            log_level: default_log_level(),
        }
    }

    /// Resolved database location.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => crate::db::default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "No database_path configured and no home directory found".to_string(),
            }),
        }
    }
}
