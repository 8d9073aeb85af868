//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scanfme_core::types::Platform;

/// Default base name of generated report files.
pub const DEFAULT_REPORT_NAME: &str = "report.csv";

#[derive(Parser, Debug)]
#[command(
    name = "scanfme-report",
    version,
    about = "Diagnostics and reports for the ScanFME scan database"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Deployment to query.
    #[arg(long, value_enum, default_value_t = PlatformArg::Prod, global = true)]
    pub platform: PlatformArg,

    /// Extra `.env`-style settings file.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory receiving report files. Created if missing.
    #[arg(long, default_value = "reports", global = true)]
    pub output_dir: PathBuf,

    /// Read collections from a JSON snapshot instead of the live database.
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check that the database answers.
    Check,

    /// Print every diagnosis as JSON.
    Diagnose {
        /// 1 for the configured workgroup, 0 for the whole database.
        #[arg(long, default_value_t = 1)]
        scope: i64,
    },

    /// Write the collection summary report.
    Collections {
        /// 1 for the configured workgroup, 0 for the whole database.
        #[arg(long, default_value_t = 1)]
        scope: i64,

        /// Base file name; prefixed with platform and scope.
        #[arg(long, default_value = DEFAULT_REPORT_NAME)]
        name: String,

        /// Write the report even if some collection counts failed.
        #[arg(long)]
        allow_partial: bool,
    },

    /// Write the worker version report.
    Workers {
        /// 1 for the configured workgroup, 0 for the whole database.
        #[arg(long, default_value_t = 0)]
        scope: i64,

        /// Base file name; prefixed with platform and scope.
        #[arg(long, default_value = DEFAULT_REPORT_NAME)]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Qa,
    Prod,
}

impl From<PlatformArg> for Platform {
    fn from(v: PlatformArg) -> Self {
        match v {
            PlatformArg::Qa => Platform::Qa,
            PlatformArg::Prod => Platform::Prod,
        }
    }
}
