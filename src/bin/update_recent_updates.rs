//! Record how many collection objects changed since the last retrain.
//!
//! Env vars:
//!   LAST_RETRAIN_DATE (required)  ISO date, e.g. 2025-10-19
//!   MET_API_BASE      (optional)  API base URL, for testing against a mock
//!   OUTPUT_PATHS      (optional)  comma-separated analysis_stats.json paths

use std::process::ExitCode;

use art_insights::update::{self, UpdateConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = UpdateConfig::from_env()?;
    let updated = update::run(&config)?;
    log::info!("{updated} of {} files updated", config.output_paths.len());
    Ok(())
}
