//! Test harness for isolated test execution.

use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use plugin_results::db::target_repo;
use plugin_results::{ArtifactManager, Database, PluginInfo, ResultStore};

pub struct TestHarness {
    /// Keeps the output root alive for the test's duration.
    temp_dir: TempDir,
    pub output_dir: PathBuf,
    pub store: ResultStore,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");

        let db = Database::open_in_memory().expect("Failed to open database");
        let store = ResultStore::new(db, ArtifactManager::new(&output_dir));

        Self {
            temp_dir,
            output_dir,
            store,
        }
    }

    pub fn db(&self) -> &Database {
        self.store.db()
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn create_target(&self, url: &str) -> i64 {
        target_repo::create_target(self.db(), url).expect("Failed to create target")
    }

    pub fn create_session(&self, name: &str, targets: &[i64]) -> i64 {
        let session = target_repo::create_session(self.db(), name).expect("Failed to create session");
        for &target in targets {
            target_repo::add_target_to_session(self.db(), session, target)
                .expect("Failed to link target");
        }
        session
    }

    /// Creates an artifact directory with one file in it and returns its relative path.
    pub fn create_artifact(&self, relative: &str) -> String {
        let dir = self.output_dir.join(relative);
        std::fs::create_dir_all(&dir).expect("Failed to create artifact directory");
        std::fs::write(dir.join("output.txt"), "scan output").expect("Failed to write artifact");
        relative.to_string()
    }

    pub fn artifact_exists(&self, relative: &str) -> bool {
        self.output_dir.join(relative).exists()
    }

    /// Saves a completed run with a trivial payload.
    pub fn save(&self, target_id: i64, plugin: &PluginInfo) {
        self.store
            .save_full(plugin, &json!([{"type": "text", "output": {"body": "ok"}}]), target_id)
            .expect("Failed to save plugin output");
    }
}
