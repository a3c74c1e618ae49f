//! On-disk artifact directories produced by plugin runs.
//!
//! Each run that writes files gets a directory under the output root;
//! the result record stores its path relative to that root.

use std::path::{Component, Path, PathBuf};

use crate::error::ArtifactError;
use crate::models::PluginInfo;

pub struct ArtifactManager {
    output_directory: PathBuf,
}

impl ArtifactManager {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Resolves a stored relative path against the output root.
    ///
    /// Absolute paths and `..` components are rejected.
    pub fn resolve(&self, output_path: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(output_path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || output_path.is_empty() {
            return Err(ArtifactError::OutsideRoot(output_path.to_string()));
        }
        Ok(self.output_directory.join(relative))
    }

    /// Whether the artifact directory exists on disk.
    pub fn exists(&self, output_path: &str) -> bool {
        self.resolve(output_path)
            .map(|path| path.is_dir())
            .unwrap_or(false)
    }

    /// The `output_path` to persist for a run: the plugin's own path, but only
    /// if that directory actually exists right now.
    pub fn existing_output_path(&self, plugin: &PluginInfo) -> Option<String> {
        plugin
            .output_path
            .as_deref()
            .filter(|path| self.exists(path))
            .map(str::to_string)
    }

    /// Recursively deletes an artifact directory.
    ///
    /// Returns `Ok(false)` if it was already gone, including when it vanishes
    /// mid-removal.
    pub fn remove(&self, output_path: &str) -> Result<bool, ArtifactError> {
        let path = self.resolve(output_path)?;
        if !path.exists() {
            log::debug!("Artifact directory already absent: {}", path.display());
            return Ok(false);
        }

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                log::debug!("Removed artifact directory {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArtifactError::Remove { path, source: e }),
        }
    }
}
