use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultStoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to encode plugin output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("Integer has to be provided for integer field '{field}', got '{value}'")]
    NotAnInteger { field: String, value: String },

    #[error("Value {value} for '{field}' is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: String,
        value: String,
        min: i64,
        max: i64,
    },
}

impl ParamError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ParamError::NotAnInteger { field, .. } | ParamError::OutOfRange { field, .. } => field,
        }
    }
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to remove artifact directory '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact path '{0}' escapes the output root")]
    OutsideRoot(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),
}

pub type Result<T> = std::result::Result<T, ResultStoreError>;
