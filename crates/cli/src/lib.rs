//! `scanfme-report` library crate.
//!
//! Configuration, argument parsing and report orchestration. The binary
//! entrypoint lives in `main.rs`; everything else is exposed here for
//! integration testing.

use std::time::Duration;

use anyhow::Context;
use scanfme_core::types::Platform;
use scanfme_db::DiagnosticsAggregator;

pub mod cli;
pub mod config;
pub mod runner;

use cli::Cli;
use config::ReportSettings;
use runner::Runner;

/// How long the driver waits for a reachable server before giving up.
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute one parsed command line, printing to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(path) = &cli.settings {
        dotenvy::from_path_override(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    }

    let platform = Platform::from(cli.platform);
    let settings = ReportSettings::from_env(platform)?;
    let mut stdout = std::io::stdout();

    match &cli.snapshot {
        Some(path) => {
            let store = runner::load_snapshot(path)?;
            tracing::info!(platform = %platform, snapshot = %path.display(), "Using offline snapshot");
            let aggregator = DiagnosticsAggregator::new(store, settings.aggregator_config());
            Runner::new(aggregator, platform, &cli.output_dir)
                .execute(&cli.command, &mut stdout)
                .await?;
        }
        None => {
            let connection = config::connection_settings_from_env(platform)?;
            let store = scanfme_db::connect(platform, &connection, SERVER_SELECTION_TIMEOUT).await?;
            let aggregator = DiagnosticsAggregator::new(store, settings.aggregator_config());
            Runner::new(aggregator, platform, &cli.output_dir)
                .execute(&cli.command, &mut stdout)
                .await?;
        }
    }

    Ok(())
}
