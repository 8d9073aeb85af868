//! Diagnostics aggregation over a [`DocumentStore`].
//!
//! [`DiagnosticsAggregator`] issues the scoped counts and finds behind every
//! report. It holds no state between calls besides its configuration; each
//! method is an independent read.

use futures::future::join_all;
use scanfme_core::collections::{
    Collection, CollectionRegistry, FIELD_EXTERNAL_ID, FIELD_FEATURE_TYPE, FIELD_ID, FIELD_STATE,
    FIELD_WORKGROUP,
};
use scanfme_core::diagnostics::{
    CollectionCount, CollectionStats, DatasetDiagnosis, DiagnosticsSnapshot, RequestDiagnosis,
    RequestState, RequestStateSummary, SubscriptionRecord, WorkerDiagnosis,
};
use scanfme_core::error::CoreError;
use scanfme_core::store::{DocumentStore, Filter, FindOptions, SortDirection};
use scanfme_core::types::{Platform, Scope, WorkgroupId};

/// Worker version assumed current when none is configured.
pub const DEFAULT_WORKER_VERSION: &str = "2.1.0";

/// Immutable settings bound at construction.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub registry: CollectionRegistry,
    /// Installed worker version considered up to date.
    pub reference_version: String,
    /// Workgroup used for scope flag `1`.
    pub default_workgroup: Option<WorkgroupId>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            registry: CollectionRegistry::standard(),
            reference_version: DEFAULT_WORKER_VERSION.to_string(),
            default_workgroup: None,
        }
    }
}

pub struct DiagnosticsAggregator<S> {
    store: S,
    config: AggregatorConfig,
}

/// Filter selecting the documents of `scope`.
fn scope_filter(scope: &Scope) -> Filter {
    match scope {
        Scope::Workgroup(wg) => Filter::new().eq(FIELD_WORKGROUP, wg.as_str()),
        Scope::Database => Filter::new(),
    }
}

impl<S: DocumentStore> DiagnosticsAggregator<S> {
    pub fn new(store: S, config: AggregatorConfig) -> Self {
        Self { store, config }
    }

    /// Resolve a `1`/`0` scope flag against the configured default workgroup.
    pub fn scope(&self, flag: i64) -> Result<Scope, CoreError> {
        Scope::from_flag(flag, self.config.default_workgroup.as_ref())
    }

    /// Fail with [`CoreError::Connection`] unless the store answers its probe.
    pub async fn ensure_connected(&self) -> Result<(), CoreError> {
        crate::health_check(&self.store).await
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    /// Count every registered collection under `scope`.
    ///
    /// Counts run concurrently and fail independently; the result keeps
    /// registry order.
    pub async fn collection_stats(&self, scope: &Scope) -> CollectionStats {
        let filter = scope_filter(scope);
        let filter = &filter;

        let counts = self.config.registry.entries().iter().map(|info| async move {
            let outcome = self.store.count(info.collection.name(), filter).await;
            match &outcome {
                Ok(count) => tracing::debug!(
                    collection = info.collection.name(),
                    abbrev = info.abbreviation,
                    count,
                    "Collection counted",
                ),
                Err(e) => tracing::warn!(
                    collection = info.collection.name(),
                    abbrev = info.abbreviation,
                    error = %e.message,
                    "Collection count failed",
                ),
            }
            CollectionCount {
                collection: info.collection,
                outcome,
            }
        });

        let stats = CollectionStats::new(join_all(counts).await);
        tracing::info!(
            scope = %scope,
            failures = stats.failures().count(),
            "Collection stats computed",
        );
        stats
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    /// Count datasets never matched with a catalog record.
    pub async fn dataset_diagnosis(&self, scope: &Scope) -> Result<DatasetDiagnosis, CoreError> {
        let filter = scope_filter(scope).exists(FIELD_EXTERNAL_ID, false);
        let no_isogeo_id = self
            .store
            .count(Collection::Datasets.name(), &filter)
            .await?;
        tracing::debug!(scope = %scope, no_isogeo_id, "Dataset diagnosis computed");
        Ok(DatasetDiagnosis { no_isogeo_id })
    }

    /// Count datasets sharing the layer name `feature_type`.
    pub async fn dataset_duplicates(&self, scope: &Scope, feature_type: &str) -> Result<u64, CoreError> {
        let filter = scope_filter(scope).eq(FIELD_FEATURE_TYPE, feature_type);
        Ok(self.store.count(Collection::Datasets.name(), &filter).await?)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Count requests per terminal state and pick the latest of each.
    pub async fn request_diagnosis(&self, scope: &Scope) -> Result<RequestDiagnosis, CoreError> {
        let (finished, broken, killed) = futures::try_join!(
            self.request_state_summary(scope, RequestState::Finished),
            self.request_state_summary(scope, RequestState::Broken),
            self.request_state_summary(scope, RequestState::Killed),
        )?;

        Ok(RequestDiagnosis {
            finished,
            broken,
            killed,
        })
    }

    /// Latest request = first by descending `_id`; object ids start with
    /// their creation time.
    async fn request_state_summary(
        &self,
        scope: &Scope,
        state: RequestState,
    ) -> Result<RequestStateSummary, CoreError> {
        let collection = Collection::Requests.name();
        let filter = scope_filter(scope).eq(FIELD_STATE, state.as_str());

        let count = self.store.count(collection, &filter).await?;
        if count == 0 {
            return Ok(RequestStateSummary::from_parts(0, None));
        }

        let options = FindOptions::sorted(FIELD_ID, SortDirection::Descending).limit(1);
        let latest = self.store.find(collection, &filter, &options).await?;
        let last = match latest.first() {
            Some(doc) => doc.get(state.payload_field()).cloned(),
            None => {
                tracing::warn!(
                    state = state.as_str(),
                    count,
                    "Requests counted but none returned by find",
                );
                None
            }
        };

        tracing::debug!(scope = %scope, state = state.as_str(), count, "Request state summarised");
        Ok(RequestStateSummary::from_parts(count, last))
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    /// Bucket subscriptions by installed worker version.
    ///
    /// Database-wide results are ordered by workgroup id.
    pub async fn worker_diagnosis(&self, scope: &Scope) -> Result<WorkerDiagnosis, CoreError> {
        let options = if scope.is_database_wide() {
            FindOptions::sorted(FIELD_WORKGROUP, SortDirection::Ascending)
        } else {
            FindOptions::default()
        };
        let docs = self
            .store
            .find(Collection::Subscriptions.name(), &scope_filter(scope), &options)
            .await?;

        let diagnosis = WorkerDiagnosis::from_records(
            docs.iter().map(SubscriptionRecord::from_document),
            &self.config.reference_version,
            scope,
        );
        let summary = diagnosis.summary();
        tracing::info!(
            scope = %scope,
            reference_version = %summary.reference_version,
            up_to_date = summary.up_to_date,
            outdated = summary.outdated,
            never_installed = summary.never_installed,
            zero_worker = summary.zero_worker,
            "Worker diagnosis computed",
        );
        Ok(diagnosis)
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Run every diagnosis for `scope`.
    pub async fn snapshot(&self, platform: Platform, scope: &Scope) -> Result<DiagnosticsSnapshot, CoreError> {
        let collections = self.collection_stats(scope).await;
        let datasets = self.dataset_diagnosis(scope).await?;
        let requests = self.request_diagnosis(scope).await?;
        let workers = self.worker_diagnosis(scope).await?.summary();

        Ok(DiagnosticsSnapshot {
            platform,
            scope: scope.clone(),
            generated_at: chrono::Utc::now(),
            collections,
            datasets,
            requests,
            workers,
        })
    }
}
