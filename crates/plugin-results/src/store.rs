//! The plugin result store: saves, review updates, filtered reads and
//! artifact-aware bulk deletion.

use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::config::Config;
use crate::db::filter::QueryMode;
use crate::db::output_repo::{self, NewOutput, OutputKey, UpsertOutcome};
use crate::db::{Database, OutputFilter, OutputPatch};
use crate::error::Result;
use crate::models::{PluginInfo, ResultRecord, ResultView, UniqueValues};
use crate::report::render::render_output;
use crate::report::{self, BusyWorkers, OutputRenderer, PlainRenderer, Progress, SeverityReport};
use crate::storage::ArtifactManager;

/// Counts from a bulk delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub records: usize,
    pub artifacts: usize,
}

pub struct ResultStore {
    db: Database,
    artifacts: ArtifactManager,
    renderer: Box<dyn OutputRenderer + Send + Sync>,
}

impl ResultStore {
    pub fn new(db: Database, artifacts: ArtifactManager) -> Self {
        Self {
            db,
            artifacts,
            renderer: Box::new(PlainRenderer),
        }
    }

    /// Opens the configured database and output root.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path()?)?;
        Ok(Self::new(db, ArtifactManager::new(&config.output_directory)))
    }

    /// Replaces the renderer used when results are read with their output.
    pub fn with_renderer(mut self, renderer: impl OutputRenderer + Send + Sync + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn output_directory(&self) -> &Path {
        self.artifacts.output_directory()
    }

    /// Persists a completed run, overwriting any previous result for the same plugin.
    pub fn save_full<T: Serialize + ?Sized>(
        &self,
        plugin: &PluginInfo,
        output: &T,
        target_id: i64,
    ) -> Result<UpsertOutcome> {
        self.save(plugin, output, None, target_id)
    }

    /// Persists an interrupted or failed run together with its error message.
    pub fn save_partial<T: Serialize + ?Sized>(
        &self,
        plugin: &PluginInfo,
        output: &T,
        message: &str,
        target_id: i64,
    ) -> Result<UpsertOutcome> {
        self.save(plugin, output, Some(message), target_id)
    }

    fn save<T: Serialize + ?Sized>(
        &self,
        plugin: &PluginInfo,
        output: &T,
        error: Option<&str>,
        target_id: i64,
    ) -> Result<UpsertOutcome> {
        let _span = tracing::info_span!(
            "store.save",
            target_id,
            plugin_key = %plugin.key,
            partial = error.is_some()
        )
        .entered();

        let output = serde_json::to_string(output)?;
        let new = NewOutput {
            target_id,
            key: OutputKey::new(&plugin.group, &plugin.plugin_type, &plugin.code),
            plugin_key: plugin.key.clone(),
            status: plugin.status.clone(),
            output: Some(output),
            output_path: self.artifacts.existing_output_path(plugin),
            error: error.map(str::to_string),
            start_time: plugin.start,
            end_time: plugin.end,
            owtf_rank: plugin.owtf_rank,
        };

        let outcome = output_repo::upsert(&self.db, &new)?;
        debug!(
            "Saved {} for target {} ({:?})",
            plugin.key, target_id, outcome
        );
        Ok(outcome)
    }

    /// Whether a result exists for a plugin's display key.
    pub fn exists(&self, plugin_key: &str, target_id: i64) -> Result<bool> {
        Ok(output_repo::exists_by_plugin_key(
            &self.db, plugin_key, target_id,
        )?)
    }

    /// Whether a plugin already produced a result for the target.
    pub fn already_ran(&self, plugin: &PluginInfo, target_id: i64) -> Result<bool> {
        let key = OutputKey::new(&plugin.group, &plugin.plugin_type, &plugin.code);
        Ok(output_repo::exists(&self.db, target_id, &key)?)
    }

    /// Applies a review patch (rank and notes). Returns `false` if no result matches.
    pub fn update(
        &self,
        plugin_group: &str,
        plugin_type: &str,
        plugin_code: &str,
        patch: &OutputPatch,
        target_id: i64,
    ) -> Result<bool> {
        patch.validate()?;
        if patch.is_empty() {
            return Ok(false);
        }

        let key = OutputKey::new(plugin_group, plugin_type, plugin_code);
        let applied = output_repo::apply_patch(&self.db, target_id, &key, patch)?;
        if !applied {
            debug!(
                "No result for {}/{}/{} on target {}; update skipped",
                plugin_group, plugin_type, plugin_code, target_id
            );
        }
        Ok(applied)
    }

    /// Raw records of a target matching the filter, ordered by plugin key.
    pub fn records(&self, filter: &OutputFilter, target_id: i64) -> Result<Vec<ResultRecord>> {
        Ok(output_repo::query(
            &self.db,
            filter,
            target_id,
            QueryMode::Ordered,
        )?)
    }

    /// Result views for the reporting layer.
    ///
    /// With `include_output` the stored payload is rendered; without it the
    /// output field is left out entirely.
    pub fn get_all(
        &self,
        filter: &OutputFilter,
        target_id: i64,
        include_output: bool,
    ) -> Result<Vec<ResultView>> {
        let views = self
            .records(filter, target_id)?
            .iter()
            .map(|record| {
                let output = include_output.then(|| {
                    record
                        .output
                        .as_deref()
                        .map(|stored| render_output(self.renderer.as_ref(), stored))
                });
                ResultView::from_record(record, output)
            })
            .collect();
        Ok(views)
    }

    /// Distinct values per filterable field, for building filter pickers.
    pub fn get_unique_values(&self, target_id: i64) -> Result<UniqueValues> {
        Ok(output_repo::unique_values(&self.db, target_id)?)
    }

    /// Deletes every result of the target matching `filter`, artifacts first.
    ///
    /// An empty filter deletes all of the target's results. Artifact
    /// directories are removed before the rows; a failed row delete leaves
    /// the already-removed directories gone.
    pub fn delete_matching(&self, filter: &OutputFilter, target_id: i64) -> Result<DeleteSummary> {
        let _span = tracing::info_span!("store.delete_matching", target_id).entered();

        let matched = output_repo::query(&self.db, filter, target_id, QueryMode::Unordered)?;

        let mut summary = DeleteSummary::default();
        for record in &matched {
            if let Some(ref output_path) = record.output_path {
                if self.artifacts.remove(output_path)? {
                    summary.artifacts += 1;
                }
            }
        }

        let keys: Vec<OutputKey> = matched.iter().map(ResultRecord::key).collect();
        summary.records = output_repo::delete_keys(&self.db, target_id, &keys)?;

        info!(
            "Deleted {} results and {} artifact directories for target {}",
            summary.records, summary.artifacts, target_id
        );
        Ok(summary)
    }

    /// Snapshot of completed versus outstanding work.
    pub fn progress(&self, workers: &dyn BusyWorkers) -> Result<Progress> {
        Ok(report::progress(&self.db, workers)?)
    }

    /// Severity histogram for a session's targets.
    pub fn severity_histogram(&self, session_id: i64) -> Result<SeverityReport> {
        Ok(report::severity_histogram(&self.db, session_id)?)
    }
}
