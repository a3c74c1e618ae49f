use serde_json::Value;

use crate::models::PluginInfo;

/// Status recorded for a run that finished normally.
pub const STATUS_SUCCESSFUL: &str = "Successful";
/// Status recorded for a run that was cut short.
pub const STATUS_ABORTED: &str = "Aborted";
/// Status recorded for a run whose plugin panicked.
pub const STATUS_CRASHED: &str = "Crashed";

/// One plugin to execute against one target.
#[derive(Debug, Clone)]
pub struct PluginJob {
    pub target_id: i64,
    pub plugin: PluginInfo,
    /// Queue entry to drop once the result is stored.
    pub work_id: Option<i64>,
}

impl PluginJob {
    pub fn new(target_id: i64, plugin: PluginInfo) -> Self {
        Self {
            target_id,
            plugin,
            work_id: None,
        }
    }

    pub fn with_work_id(mut self, work_id: i64) -> Self {
        self.work_id = Some(work_id);
        self
    }
}

/// How a plugin run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginOutcome {
    Completed { output: Value },
    /// Interrupted, timed out or failed midway; `output` holds whatever was produced.
    Partial { output: Value, message: String },
}

/// Executes plugins. Implementations must be shareable across worker threads.
pub trait PluginRunner: Send + Sync {
    fn run(&self, job: &PluginJob) -> PluginOutcome;
}

impl<F> PluginRunner for F
where
    F: Fn(&PluginJob) -> PluginOutcome + Send + Sync,
{
    fn run(&self, job: &PluginJob) -> PluginOutcome {
        self(job)
    }
}

/// Report sent back from a worker after each job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub target_id: i64,
    pub plugin_key: String,
    /// The result was stored.
    pub saved: bool,
    /// The run ended early and was stored as a partial result.
    pub partial: bool,
    pub error: Option<String>,
}
