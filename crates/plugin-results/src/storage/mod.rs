pub mod artifacts;

pub use artifacts::ArtifactManager;
