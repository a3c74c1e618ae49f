use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "plugin-results")]
#[command(version)]
#[command(about = "Reports progress and severity from a plugin result store.", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file.
    pub config: PathBuf,

    /// Session whose targets feed the severity report.
    pub session_id: Option<i64>,
}
