use std::process::ExitCode;

use art_insights::artifacts::RunStamp;
use art_insights::config::{CliArgs, RunConfig};
use art_insights::pipeline;
use clap::Parser;

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
    let args = CliArgs::parse();
    let config = RunConfig::resolve(&args)?;
    log::info!("Generating website data into {}", config.output_dir.display());
    pipeline::run(&config, RunStamp::now())?;
    log::info!("All data files generated successfully");
    Ok(())
}
