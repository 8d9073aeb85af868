//! Diagnostics records produced by the aggregator (collection counts,
//! dataset and request breakdowns, worker version buckets).
//!
//! Everything here is a read-only snapshot built fresh per run. The worker
//! bucket classification lives here as a pure function so both scopes go
//! through the same rules.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::collections::{
    Collection, FIELD_ERROR, FIELD_ID, FIELD_WORKERS, FIELD_WORKER_NAME, FIELD_WORKER_VERSION,
    FIELD_WORKGROUP,
};
use crate::error::CoreError;
use crate::store::{Document, StoreError};
use crate::types::{Platform, Scope, Timestamp};

// ---------------------------------------------------------------------------
// Collection stats
// ---------------------------------------------------------------------------

/// Count outcome for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionCount {
    pub collection: Collection,
    pub outcome: Result<u64, StoreError>,
}

/// Per-collection counts under one scope, in registry order.
///
/// Entries fail independently; use [`CollectionStats::ensure_complete`] to
/// reject partial results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionStats {
    entries: Vec<CollectionCount>,
}

impl CollectionStats {
    pub fn new(entries: Vec<CollectionCount>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CollectionCount] {
        &self.entries
    }

    /// Count for `collection`, or `None` if it failed or was not queried.
    pub fn get(&self, collection: Collection) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.collection == collection)
            .and_then(|e| e.outcome.as_ref().ok().copied())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StoreError> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().err())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Fail with the first query error, if any.
    pub fn ensure_complete(&self) -> Result<(), CoreError> {
        match self.failures().next() {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }
}

impl Serialize for CollectionStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            match &entry.outcome {
                Ok(count) => map.serialize_entry(entry.collection.name(), count)?,
                Err(err) => map.serialize_entry(
                    entry.collection.name(),
                    &serde_json::json!({ "error": err.message }),
                )?,
            }
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetDiagnosis {
    /// Datasets never matched with a catalog record.
    pub no_isogeo_id: u64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Finished,
    Broken,
    Killed,
}

pub const ALL_REQUEST_STATES: [RequestState; 3] =
    [RequestState::Finished, RequestState::Broken, RequestState::Killed];

impl RequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Broken => "broken",
            Self::Killed => "killed",
        }
    }

    /// Field reported for the latest request in this state.
    pub fn payload_field(self) -> &'static str {
        match self {
            Self::Finished => FIELD_ID,
            Self::Broken | Self::Killed => FIELD_ERROR,
        }
    }
}

/// Count of requests in one state plus the latest one's payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStateSummary {
    pub count: u64,
    /// Present iff `count > 0`. A latest record lacking the payload field
    /// yields `Some(Value::Null)`.
    pub last: Option<Value>,
}

impl RequestStateSummary {
    /// Build a summary, keeping `last` populated exactly when `count > 0`.
    pub fn from_parts(count: u64, last: Option<Value>) -> Self {
        let last = if count == 0 {
            None
        } else {
            Some(last.unwrap_or(Value::Null))
        };
        Self { count, last }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDiagnosis {
    pub finished: RequestStateSummary,
    pub broken: RequestStateSummary,
    pub killed: RequestStateSummary,
}

impl RequestDiagnosis {
    pub fn get(&self, state: RequestState) -> &RequestStateSummary {
        match state {
            RequestState::Finished => &self.finished,
            RequestState::Broken => &self.broken,
            RequestState::Killed => &self.killed,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriptions and workers
// ---------------------------------------------------------------------------

/// One worker agent installed for a workgroup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InstalledWorker {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// A subscription document reduced to what the worker diagnostics need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub workgroup_id: String,
    /// `None` when the document has no `workers` field at all.
    pub workers: Option<Vec<InstalledWorker>>,
}

impl SubscriptionRecord {
    /// Read a subscription document. Never fails: a non-array `workers`
    /// field counts as an empty list and unreadable entries become workers
    /// without name or version.
    pub fn from_document(doc: &Document) -> Self {
        let workers = doc.get(FIELD_WORKERS).map(|raw| match raw {
            Value::Array(items) => items.iter().map(installed_worker).collect(),
            _ => Vec::new(),
        });
        Self {
            id: doc.get(FIELD_ID).map(display_value).unwrap_or_default(),
            workgroup_id: doc.get(FIELD_WORKGROUP).map(display_value).unwrap_or_default(),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.as_ref().map_or(0, Vec::len)
    }

    pub fn first_worker(&self) -> Option<&InstalledWorker> {
        self.workers.as_ref().and_then(|w| w.first())
    }

    /// Whether a worker with the given version is installed.
    pub fn has_version(&self, version: &str) -> bool {
        self.workers
            .iter()
            .flatten()
            .any(|w| w.version.as_deref() == Some(version))
    }
}

fn installed_worker(raw: &Value) -> InstalledWorker {
    let text = |field: &str| match raw.get(field) {
        Some(Value::Null) | None => None,
        Some(v) => Some(display_value(v)),
    };
    InstalledWorker {
        name: text(FIELD_WORKER_NAME),
        version: text(FIELD_WORKER_VERSION),
    }
}

/// Render a scalar document value as plain text.
///
/// Strings are unquoted, extended-JSON object ids (`{"$oid": ...}`) are
/// unwrapped, null is empty and anything else is compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(oid)) => oid.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerBucket {
    UpToDate,
    Outdated,
    NeverInstalled,
    ZeroWorker,
}

/// Assign a subscription to exactly one bucket.
///
/// An empty `workers` array is its own bucket only database-wide; scoped to
/// a workgroup it counts as outdated.
pub fn classify_subscription(
    record: &SubscriptionRecord,
    reference_version: &str,
    scope: &Scope,
) -> WorkerBucket {
    match &record.workers {
        None => WorkerBucket::NeverInstalled,
        Some(_) if record.has_version(reference_version) => WorkerBucket::UpToDate,
        Some(workers) if workers.is_empty() && scope.is_database_wide() => WorkerBucket::ZeroWorker,
        Some(_) => WorkerBucket::Outdated,
    }
}

/// Subscriptions partitioned by installed worker version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerDiagnosis {
    pub reference_version: String,
    pub up_to_date: Vec<SubscriptionRecord>,
    pub outdated: Vec<SubscriptionRecord>,
    pub never_installed: Vec<SubscriptionRecord>,
    /// Always empty for workgroup-scoped diagnoses.
    pub zero_worker: Vec<SubscriptionRecord>,
}

impl WorkerDiagnosis {
    /// Partition `records`, keeping their relative order inside each bucket.
    pub fn from_records(
        records: impl IntoIterator<Item = SubscriptionRecord>,
        reference_version: &str,
        scope: &Scope,
    ) -> Self {
        let mut diagnosis = Self {
            reference_version: reference_version.to_string(),
            up_to_date: Vec::new(),
            outdated: Vec::new(),
            never_installed: Vec::new(),
            zero_worker: Vec::new(),
        };
        for record in records {
            let bucket = match classify_subscription(&record, reference_version, scope) {
                WorkerBucket::UpToDate => &mut diagnosis.up_to_date,
                WorkerBucket::Outdated => &mut diagnosis.outdated,
                WorkerBucket::NeverInstalled => &mut diagnosis.never_installed,
                WorkerBucket::ZeroWorker => &mut diagnosis.zero_worker,
            };
            bucket.push(record);
        }
        diagnosis
    }

    pub fn total(&self) -> usize {
        self.up_to_date.len()
            + self.outdated.len()
            + self.never_installed.len()
            + self.zero_worker.len()
    }

    /// Every record with its bucket, in report order.
    pub fn records(&self) -> impl Iterator<Item = (WorkerBucket, &SubscriptionRecord)> {
        self.up_to_date
            .iter()
            .map(|r| (WorkerBucket::UpToDate, r))
            .chain(self.outdated.iter().map(|r| (WorkerBucket::Outdated, r)))
            .chain(self.never_installed.iter().map(|r| (WorkerBucket::NeverInstalled, r)))
            .chain(self.zero_worker.iter().map(|r| (WorkerBucket::ZeroWorker, r)))
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            reference_version: self.reference_version.clone(),
            up_to_date: self.up_to_date.len(),
            outdated: self.outdated.len(),
            never_installed: self.never_installed.len(),
            zero_worker: self.zero_worker.len(),
            total: self.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub reference_version: String,
    pub up_to_date: usize,
    pub outdated: usize,
    pub never_installed: usize,
    pub zero_worker: usize,
    pub total: usize,
}

/// A subscription flattened into one worker report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub workgroup_id: String,
    pub record_id: String,
    pub worker_count: usize,
    pub up_to_date: bool,
    /// First worker's display name, empty when unknown.
    pub name: String,
    /// First worker's version, empty when unknown.
    pub version: String,
}

impl WorkerRecord {
    pub fn from_subscription(record: &SubscriptionRecord, bucket: WorkerBucket) -> Self {
        let first = record.first_worker();
        Self {
            workgroup_id: record.workgroup_id.clone(),
            record_id: record.id.clone(),
            worker_count: record.worker_count(),
            up_to_date: bucket == WorkerBucket::UpToDate,
            name: first.and_then(|w| w.name.clone()).unwrap_or_default(),
            version: first.and_then(|w| w.version.clone()).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Every diagnosis for one scope, as printed by the `diagnose` command.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub platform: Platform,
    pub scope: Scope,
    pub generated_at: Timestamp,
    pub collections: CollectionStats,
    pub datasets: DatasetDiagnosis,
    pub requests: RequestDiagnosis,
    pub workers: WorkerSummary,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
