//! `scanfme-report` -- diagnostics and reports for the ScanFME scan database.
//!
//! Counts scan records per collection, inspects datasets, requests and
//! installed worker versions, and writes pipe-delimited reports. Settings
//! come from the environment (see [`scanfme_report::config`]).
//!
//! # Environment variables
//!
//! | Variable     | Required | Default                               | Description              |
//! |--------------|----------|---------------------------------------|--------------------------|
//! | `RUST_LOG`   | no       | `scanfme_report=info,scanfme_db=info` | Log filter               |
//! | `LOG_FORMAT` | no       | --                                    | `json` for JSON log lines |

use std::process::ExitCode;

use clap::Parser;
use scanfme_report::cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "scanfme_report=info,scanfme_db=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, platform = ?cli.platform, "Starting scanfme-report");

    match scanfme_report::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "scanfme-report failed");
            ExitCode::FAILURE
        }
    }
}
