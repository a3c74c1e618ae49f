pub mod job;
pub mod pool;

pub use job::{JobResult, PluginJob, PluginOutcome, PluginRunner};
pub use pool::WorkerPool;
