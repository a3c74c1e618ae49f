//! Read-side reports: progress snapshots, severity histograms, output rendering.

pub mod progress;
pub mod render;
pub mod severity;

pub use progress::{progress, BusyWorkers, Progress};
pub use render::{OutputRenderer, PlainRenderer};
pub use severity::{severity_histogram, SeverityBucket, SeverityReport};
