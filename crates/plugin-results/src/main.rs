use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use serde_json::json;

use plugin_results::cli::Cli;
use plugin_results::{load_config, logging, ResultStore};

fn run(config_path: &Path, session_id: Option<i64>) -> plugin_results::Result<()> {
    let config = load_config(config_path)?;
    logging::init(&config.log_level);

    info!(
        "Starting plugin-results v{} with output root {}",
        env!("CARGO_PKG_VERSION"),
        config.output_directory
    );

    let store = ResultStore::open(&config)?;
    // No pool runs in this process, so nobody is busy.
    let progress = store.progress(&0usize)?;

    let mut report = json!({ "progress": progress });
    if let Some(session_id) = session_id {
        report["severity"] = json!(store.severity_histogram(session_id)?);
    }

    println!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli.config, cli.session_id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
