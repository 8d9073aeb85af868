//! Identifiers, deployment platforms and query scope.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Length of a workgroup token.
pub const WORKGROUP_ID_LEN: usize = 32;

/// Scope flag selecting a single workgroup.
pub const SCOPE_FLAG_WORKGROUP: i64 = 1;

/// Scope flag selecting the whole database.
pub const SCOPE_FLAG_DATABASE: i64 = 0;

// ---------------------------------------------------------------------------
// Workgroup identifier
// ---------------------------------------------------------------------------

/// Opaque 32-character workgroup token. Only the length is validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkgroupId(String);

impl WorkgroupId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let len = raw.chars().count();
        if len != WORKGROUP_ID_LEN {
            return Err(CoreError::InvalidArgument(format!(
                "Invalid workgroup id '{raw}': expected {WORKGROUP_ID_LEN} characters, got {len}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkgroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Deployment target of the scan database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Single-host quality-assurance database.
    Qa,
    /// Two-host production replica set.
    Prod,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::Prod => "prod",
        }
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qa" => Ok(Self::Qa),
            "prod" => Ok(Self::Prod),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown platform '{other}'. Must be one of: qa, prod"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Restricts every diagnostic query to one workgroup or to the whole database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "workgroup", rename_all = "snake_case")]
pub enum Scope {
    Workgroup(WorkgroupId),
    Database,
}

impl Scope {
    /// Resolve a `1`/`0` scope flag.
    ///
    /// Flag `1` binds the default workgroup, which must then be configured.
    pub fn from_flag(flag: i64, default_workgroup: Option<&WorkgroupId>) -> Result<Self, CoreError> {
        match flag {
            SCOPE_FLAG_WORKGROUP => default_workgroup
                .cloned()
                .map(Self::Workgroup)
                .ok_or_else(|| {
                    CoreError::InvalidArgument(
                        "Workgroup scope requested but no default workgroup is configured".into(),
                    )
                }),
            SCOPE_FLAG_DATABASE => Ok(Self::Database),
            other => Err(CoreError::InvalidArgument(format!(
                "Invalid scope flag {other}. Must be 1 (workgroup) or 0 (database)"
            ))),
        }
    }

    pub fn workgroup(&self) -> Option<&WorkgroupId> {
        match self {
            Self::Workgroup(wg) => Some(wg),
            Self::Database => None,
        }
    }

    pub fn is_database_wide(&self) -> bool {
        matches!(self, Self::Database)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workgroup(wg) => write!(f, "workgroup {wg}"),
            Self::Database => f.write_str("database"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
