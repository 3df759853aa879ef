//! ## rumensim-cli
//! **Operational entry point**
//!
//! Runs the fermentation simulator standalone (telemetry to the log sink)
//! or generates deterministic model series for dashboard seeding.

use clap::Parser;
use rumensim_telemetry::logging::EventLogger;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    EventLogger::init();
    let cli = Cli::parse();
    commands::run_command(cli).await
}
