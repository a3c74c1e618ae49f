pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod report;
pub mod storage;
pub mod store;
pub mod worker;

pub use config::{load_config, Config};
pub use db::{Database, FilterValue, OutputFilter, OutputPatch, ParamValue};
pub use error::{ArtifactError, ConfigError, ParamError, Result, ResultStoreError, WorkerError};
pub use models::{PluginInfo, ResultRecord, ResultView, UniqueValues, UNRANKED};
pub use report::{BusyWorkers, OutputRenderer, Progress, SeverityReport};
pub use storage::ArtifactManager;
pub use store::{DeleteSummary, ResultStore};
pub use worker::{PluginJob, PluginOutcome, PluginRunner, WorkerPool};
