//! Per-platform settings loaded from environment variables.
//!
//! Every variable is prefixed with the platform: `SCANFME_QA_` or
//! `SCANFME_PROD_`.
//!
//! | Suffix           | Required  | Default  | Description                        |
//! |------------------|-----------|----------|------------------------------------|
//! | `USERNAME`       | yes       | --       | Database user                      |
//! | `PASSWORD`       | yes       | --       | Database password                  |
//! | `SERVER`         | yes       | --       | Host, or `host0|host1` for prod    |
//! | `PORT`           | no        | `27017`  | Port shared by every host          |
//! | `DB_NAME`        | yes       | --       | Database name                      |
//! | `REPLICA_SET`    | prod only | --       | Replica set name                   |
//! | `WORKGROUP`      | no        | --       | Workgroup used for scope `1`       |
//! | `WORKER_VERSION` | no        | `2.1.0`  | Worker version considered current  |
//!
//! Connection variables are only read when a live database is used; offline
//! snapshots need the report settings alone.

use scanfme_core::error::CoreError;
use scanfme_core::types::{Platform, WorkgroupId};
use scanfme_db::uri::DEFAULT_PORT;
use scanfme_db::{AggregatorConfig, ConnectionSettings, DEFAULT_WORKER_VERSION};

/// Environment variable prefix for `platform`.
pub fn env_prefix(platform: Platform) -> String {
    format!("SCANFME_{}_", platform.as_str().to_uppercase())
}

/// Reads one prefixed variable; blank values count as unset.
struct PlatformEnv<F> {
    prefix: String,
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> PlatformEnv<F> {
    fn new(platform: Platform, lookup: F) -> Self {
        Self {
            prefix: env_prefix(platform),
            lookup,
        }
    }

    fn optional(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{}{suffix}", self.prefix))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, suffix: &str) -> Result<String, CoreError> {
        self.optional(suffix).ok_or_else(|| {
            CoreError::InvalidArgument(format!("{}{suffix} must be set", self.prefix))
        })
    }
}

// ---------------------------------------------------------------------------
// Report settings
// ---------------------------------------------------------------------------

/// Settings every report run needs, live or offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub workgroup: Option<WorkgroupId>,
    pub worker_version: String,
}

impl ReportSettings {
    pub fn from_env(platform: Platform) -> Result<Self, CoreError> {
        Self::from_lookup(platform, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        platform: Platform,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        let env = PlatformEnv::new(platform, lookup);
        let workgroup = env
            .optional("WORKGROUP")
            .map(|raw| WorkgroupId::parse(&raw))
            .transpose()?;
        let worker_version = env
            .optional("WORKER_VERSION")
            .unwrap_or_else(|| DEFAULT_WORKER_VERSION.to_string());

        Ok(Self {
            workgroup,
            worker_version,
        })
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            reference_version: self.worker_version.clone(),
            default_workgroup: self.workgroup.clone(),
            ..AggregatorConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Connection settings
// ---------------------------------------------------------------------------

pub fn connection_settings_from_env(platform: Platform) -> Result<ConnectionSettings, CoreError> {
    connection_settings_from_lookup(platform, |key| std::env::var(key).ok())
}

pub fn connection_settings_from_lookup(
    platform: Platform,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ConnectionSettings, CoreError> {
    let env = PlatformEnv::new(platform, lookup);

    let port = match env.optional("PORT") {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            CoreError::InvalidArgument(format!("{}PORT must be a valid port, got '{raw}'", env.prefix))
        })?,
        None => DEFAULT_PORT,
    };
    let replica_set = match platform {
        Platform::Prod => Some(env.required("REPLICA_SET")?),
        Platform::Qa => env.optional("REPLICA_SET"),
    };

    Ok(ConnectionSettings {
        username: env.required("USERNAME")?,
        password: env.required("PASSWORD")?,
        server: env.required("SERVER")?,
        port,
        db_name: env.required("DB_NAME")?,
        replica_set,
    })
}
