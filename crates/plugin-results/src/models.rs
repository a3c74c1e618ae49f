//! Plugin run descriptors and persisted result records.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Row;
use serde::Serialize;

/// Sentinel for "no rank" on both `user_rank` and `owtf_rank`.
pub const UNRANKED: i32 = -1;

/// Highest severity rank (Critical).
pub const MAX_RANK: i32 = 5;

/// Display format used for start/end times in result views.
pub const DATE_TIME_FORMAT: &str = "%d/%m/%Y-%H:%M";

/// Describes one plugin run as reported by a worker at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub group: String,
    pub plugin_type: String,
    pub code: String,
    /// Derived display identifier, `"{type}@{code}"`.
    pub key: String,
    pub status: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub owtf_rank: i32,
    /// Artifact directory relative to the output root, if the plugin writes files.
    pub output_path: Option<String>,
}

impl PluginInfo {
    pub fn new(group: &str, plugin_type: &str, code: &str) -> Self {
        let now = Utc::now();
        Self {
            group: group.to_string(),
            plugin_type: plugin_type.to_string(),
            code: code.to_string(),
            key: plugin_key(plugin_type, code),
            status: "Successful".to_string(),
            start: now,
            end: now,
            owtf_rank: UNRANKED,
            output_path: None,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_rank(mut self, owtf_rank: i32) -> Self {
        self.owtf_rank = owtf_rank;
        self
    }

    pub fn with_output_path(mut self, output_path: &str) -> Self {
        self.output_path = Some(output_path.to_string());
        self
    }
}

/// Builds the display key for a plugin.
pub fn plugin_key(plugin_type: &str, code: &str) -> String {
    format!("{}@{}", plugin_type, code)
}

/// A persisted plugin result, one per natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub target_id: i64,
    pub plugin_group: String,
    pub plugin_type: String,
    pub plugin_code: String,
    pub plugin_key: String,
    pub status: Option<String>,
    /// JSON-encoded payload.
    pub output: Option<String>,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_rank: i32,
    pub owtf_rank: i32,
    pub user_notes: Option<String>,
}

impl ResultRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            target_id: row.get("target_id")?,
            plugin_group: row.get("plugin_group")?,
            plugin_type: row.get("plugin_type")?,
            plugin_code: row.get("plugin_code")?,
            plugin_key: row.get("plugin_key")?,
            status: row.get("status")?,
            output: row.get("output")?,
            output_path: row.get("output_path")?,
            error: row.get("error")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            user_rank: row.get("user_rank")?,
            owtf_rank: row.get("owtf_rank")?,
            user_notes: row.get("user_notes")?,
        })
    }

    pub fn run_time(&self) -> Duration {
        self.end_time - self.start_time
    }
}

pub(crate) fn effective_rank(user_rank: i32, owtf_rank: i32) -> Option<i32> {
    if user_rank != UNRANKED {
        Some(user_rank)
    } else if owtf_rank != UNRANKED {
        Some(owtf_rank)
    } else {
        None
    }
}

/// Formats a run time as `"1h 2m 3s 40ms"`, dropping leading zero units.
pub fn format_run_time(run_time: Duration) -> String {
    let total_ms = run_time.num_milliseconds().max(0);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if hours > 0 || minutes > 0 || seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.push(format!("{}ms", millis));
    parts.join(" ")
}

/// Serializable view of a result record handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub target_id: i64,
    pub plugin_group: String,
    pub plugin_type: String,
    pub plugin_code: String,
    pub plugin_key: String,
    pub status: Option<String>,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub user_rank: i32,
    pub owtf_rank: i32,
    pub user_notes: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub run_time: String,
    /// Absent when output was not requested; `null` when requested but never stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Option<String>>,
}

impl ResultView {
    pub fn from_record(record: &ResultRecord, rendered_output: Option<Option<String>>) -> Self {
        Self {
            target_id: record.target_id,
            plugin_group: record.plugin_group.clone(),
            plugin_type: record.plugin_type.clone(),
            plugin_code: record.plugin_code.clone(),
            plugin_key: record.plugin_key.clone(),
            status: record.status.clone(),
            output_path: record.output_path.clone(),
            error: record.error.clone(),
            user_rank: record.user_rank,
            owtf_rank: record.owtf_rank,
            user_notes: record.user_notes.clone(),
            start_time: record.start_time.format(DATE_TIME_FORMAT).to_string(),
            end_time: record.end_time.format(DATE_TIME_FORMAT).to_string(),
            run_time: format_run_time(record.run_time()),
            output: rendered_output,
        }
    }
}

/// Distinct values per filterable field for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UniqueValues {
    pub plugin_type: Vec<String>,
    pub plugin_group: Vec<String>,
    pub plugin_code: Vec<String>,
    pub status: Vec<String>,
    pub user_rank: Vec<i32>,
    pub owtf_rank: Vec<i32>,
}
