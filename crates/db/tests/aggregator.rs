//! Integration tests for the diagnostics aggregator against the in-memory
//! store: scoped counts, dataset and request breakdowns, worker buckets.

use assert_matches::assert_matches;
use serde_json::{json, Value};

use scanfme_core::collections::{Collection, ALL_COLLECTIONS};
use scanfme_core::diagnostics::{RequestState, ALL_REQUEST_STATES};
use scanfme_core::error::CoreError;
use scanfme_core::types::{Platform, Scope, WorkgroupId};
use scanfme_db::{AggregatorConfig, DiagnosticsAggregator, MemoryStore};

const WG: &str = "abcd1234abcd1234abcd1234abcd1234";
const OTHER_WG: &str = "ffff0000ffff0000ffff0000ffff0000";

fn workgroup() -> WorkgroupId {
    WorkgroupId::parse(WG).unwrap()
}

fn config() -> AggregatorConfig {
    AggregatorConfig {
        default_workgroup: Some(workgroup()),
        ..AggregatorConfig::default()
    }
}

fn aggregator(store: MemoryStore) -> DiagnosticsAggregator<MemoryStore> {
    DiagnosticsAggregator::new(store, config())
}

fn store_with(collections: Value) -> MemoryStore {
    MemoryStore::from_snapshot(collections).unwrap()
}

fn fixture() -> MemoryStore {
    store_with(json!({
        "datasets": [
            {"_id": "d1", "groupId": WG, "isogeo_id": "i1", "featureType": "roads"},
            {"_id": "d2", "groupId": WG, "isogeo_id": "i2", "featureType": "roads"},
            {"_id": "d3", "groupId": WG, "featureType": "rivers"},
            {"_id": "d4", "groupId": OTHER_WG},
        ],
        "entrypoints": [
            {"_id": "e1", "groupId": WG},
            {"_id": "e2", "groupId": WG},
        ],
        "requests": [
            {"_id": "r1", "groupId": WG, "state": "finished"},
            {"_id": "r2", "groupId": WG, "state": "finished"},
            {"_id": "r3", "groupId": OTHER_WG, "state": "broken", "err": "timeout"},
            {"_id": "r4", "groupId": OTHER_WG, "state": "killed"},
        ],
        "subscriptions": [
            {"_id": "s1", "groupId": WG, "workers": [{"givenName": "srv", "version": "2.1.0"}]},
            {"_id": "s2", "groupId": OTHER_WG, "workers": []},
            {"_id": "s3", "groupId": "0000aaaa0000aaaa0000aaaa0000aaaa"},
            {"_id": "s4", "groupId": "9999bbbb9999bbbb9999bbbb9999bbbb", "workers": [{"version": "1.8.0"}]},
        ],
    }))
}

// ---------------------------------------------------------------------------
// Scope resolution
// ---------------------------------------------------------------------------

/// Flags other than 1 and 0 are rejected before any query runs.
#[test]
fn unknown_scope_flags_are_invalid_arguments() {
    let agg = aggregator(fixture());
    for flag in [2, -1, 42] {
        assert_matches!(agg.scope(flag), Err(CoreError::InvalidArgument(_)));
    }
    assert_eq!(agg.scope(1).unwrap(), Scope::Workgroup(workgroup()));
    assert_eq!(agg.scope(0).unwrap(), Scope::Database);
}

/// Workgroup scope needs a configured default workgroup.
#[test]
fn workgroup_scope_without_default_is_invalid() {
    let agg = DiagnosticsAggregator::new(fixture(), AggregatorConfig::default());
    assert_matches!(agg.scope(1), Err(CoreError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// Collection stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collection_stats_workgroup_scoped() {
    let agg = aggregator(fixture());
    let stats = agg.collection_stats(&Scope::Workgroup(workgroup())).await;

    assert!(stats.is_complete());
    assert_eq!(stats.entries().len(), ALL_COLLECTIONS.len());
    assert_eq!(stats.get(Collection::Datasets), Some(3));
    assert_eq!(stats.get(Collection::Entrypoints), Some(2));
    assert_eq!(stats.get(Collection::Requests), Some(2));
    assert_eq!(stats.get(Collection::Subscriptions), Some(1));
    assert_eq!(stats.get(Collection::Sessions), Some(0));
}

#[tokio::test]
async fn collection_stats_database_wide() {
    let agg = aggregator(fixture());
    let stats = agg.collection_stats(&Scope::Database).await;
    assert_eq!(stats.get(Collection::Datasets), Some(4));
    assert_eq!(stats.get(Collection::Requests), Some(4));
    assert_eq!(stats.get(Collection::Subscriptions), Some(4));
}

/// Entries keep registry order regardless of completion order.
#[tokio::test]
async fn collection_stats_follow_registry_order() {
    let agg = aggregator(fixture());
    let stats = agg.collection_stats(&Scope::Database).await;
    let order: Vec<_> = stats.entries().iter().map(|e| e.collection).collect();
    assert_eq!(order, ALL_COLLECTIONS);
}

/// One failing collection does not prevent the others from being counted.
#[tokio::test]
async fn failing_collection_keeps_other_counts() {
    let mut store = fixture();
    store.mark_unavailable("entrypoints");
    let agg = aggregator(store);

    let stats = agg.collection_stats(&Scope::Database).await;
    assert!(!stats.is_complete());
    assert_eq!(stats.get(Collection::Entrypoints), None);
    assert_eq!(stats.get(Collection::Datasets), Some(4));
    assert_eq!(stats.failures().count(), 1);
    assert_matches!(
        stats.ensure_complete(),
        Err(CoreError::Query { ref collection, .. }) if collection == "entrypoints"
    );
}

/// Two runs against an unchanged store give identical stats.
#[tokio::test]
async fn collection_stats_are_idempotent() {
    let agg = aggregator(fixture());
    let scope = Scope::Workgroup(workgroup());
    let first = agg.collection_stats(&scope).await;
    let second = agg.collection_stats(&scope).await;
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// Three datasets for the workgroup, one lacking an external id.
#[tokio::test]
async fn dataset_diagnosis_counts_missing_external_ids() {
    let agg = aggregator(fixture());
    let diagnosis = agg
        .dataset_diagnosis(&Scope::Workgroup(workgroup()))
        .await
        .unwrap();
    assert_eq!(diagnosis.no_isogeo_id, 1);

    let diagnosis = agg.dataset_diagnosis(&Scope::Database).await.unwrap();
    assert_eq!(diagnosis.no_isogeo_id, 2);
}

#[tokio::test]
async fn dataset_duplicates_count_same_feature_type() {
    let agg = aggregator(fixture());
    let scope = Scope::Workgroup(workgroup());
    assert_eq!(agg.dataset_duplicates(&scope, "roads").await.unwrap(), 2);
    assert_eq!(agg.dataset_duplicates(&scope, "lakes").await.unwrap(), 0);
}

#[tokio::test]
async fn dataset_diagnosis_surfaces_query_error() {
    let mut store = fixture();
    store.mark_unavailable("datasets");
    let agg = aggregator(store);
    assert_matches!(
        agg.dataset_diagnosis(&Scope::Database).await,
        Err(CoreError::Query { .. })
    );
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// No broken requests in the workgroup: zero count and no "last", not an error.
#[tokio::test]
async fn zero_broken_requests_have_no_last() {
    let agg = aggregator(fixture());
    let diagnosis = agg
        .request_diagnosis(&Scope::Workgroup(workgroup()))
        .await
        .unwrap();
    assert_eq!(diagnosis.broken.count, 0);
    assert_eq!(diagnosis.broken.last, None);
    assert_eq!(diagnosis.killed.count, 0);
    assert_eq!(diagnosis.killed.last, None);
}

/// The finished payload is the latest request id; broken/killed carry `err`.
#[tokio::test]
async fn latest_request_payloads() {
    let agg = aggregator(fixture());

    let scoped = agg
        .request_diagnosis(&Scope::Workgroup(workgroup()))
        .await
        .unwrap();
    assert_eq!(scoped.finished.count, 2);
    assert_eq!(scoped.finished.last, Some(json!("r2")));

    let all = agg.request_diagnosis(&Scope::Database).await.unwrap();
    assert_eq!(all.broken.count, 1);
    assert_eq!(all.broken.last, Some(json!("timeout")));
    // Killed request without an error payload is still reported.
    assert_eq!(all.killed.count, 1);
    assert_eq!(all.killed.last, Some(Value::Null));
}

/// "last" is present exactly when the count is nonzero, for every state.
#[tokio::test]
async fn request_last_present_iff_count_nonzero() {
    let agg = aggregator(fixture());
    for scope in [Scope::Workgroup(workgroup()), Scope::Database] {
        let diagnosis = agg.request_diagnosis(&scope).await.unwrap();
        for state in ALL_REQUEST_STATES {
            let summary = diagnosis.get(state);
            assert_eq!(
                summary.count == 0,
                summary.last.is_none(),
                "{} under {scope}",
                state.as_str()
            );
        }
    }
}

#[tokio::test]
async fn request_diagnosis_empty_store() {
    let agg = aggregator(MemoryStore::new());
    let diagnosis = agg.request_diagnosis(&Scope::Database).await.unwrap();
    assert_eq!(diagnosis.get(RequestState::Finished).count, 0);
    assert_eq!(diagnosis.get(RequestState::Finished).last, None);
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// `{workers: []}` database-wide is zero-worker, not outdated.
#[tokio::test]
async fn empty_workers_database_wide_is_zero_worker() {
    let store = store_with(json!({
        "subscriptions": [{"_id": "s1", "groupId": WG, "workers": []}]
    }));
    let agg = aggregator(store);
    let diagnosis = agg.worker_diagnosis(&Scope::Database).await.unwrap();
    assert_eq!(diagnosis.zero_worker.len(), 1);
    assert!(diagnosis.outdated.is_empty());
}

/// The same record scoped to its workgroup counts as outdated.
#[tokio::test]
async fn empty_workers_workgroup_scoped_is_outdated() {
    let store = store_with(json!({
        "subscriptions": [{"_id": "s1", "groupId": WG, "workers": []}]
    }));
    let agg = aggregator(store);
    let diagnosis = agg
        .worker_diagnosis(&Scope::Workgroup(workgroup()))
        .await
        .unwrap();
    assert_eq!(diagnosis.outdated.len(), 1);
    assert!(diagnosis.zero_worker.is_empty());
}

/// Database-wide buckets add up to the subscription count.
#[tokio::test]
async fn worker_buckets_sum_to_subscription_count() {
    let agg = aggregator(fixture());
    let diagnosis = agg.worker_diagnosis(&Scope::Database).await.unwrap();
    let stats = agg.collection_stats(&Scope::Database).await;

    let summary = diagnosis.summary();
    assert_eq!(summary.up_to_date, 1);
    assert_eq!(summary.outdated, 1);
    assert_eq!(summary.never_installed, 1);
    assert_eq!(summary.zero_worker, 1);
    assert_eq!(
        Some(summary.total as u64),
        stats.get(Collection::Subscriptions)
    );
}

/// Database-wide buckets list tenants in workgroup id order.
#[tokio::test]
async fn database_wide_workers_sorted_by_workgroup() {
    let store = store_with(json!({
        "subscriptions": [
            {"_id": "s1", "groupId": "c", "workers": [{"version": "1.0"}]},
            {"_id": "s2", "groupId": "a", "workers": [{"version": "1.0"}]},
            {"_id": "s3", "groupId": "b", "workers": [{"version": "1.0"}]},
        ]
    }));
    let agg = aggregator(store);
    let diagnosis = agg.worker_diagnosis(&Scope::Database).await.unwrap();
    let order: Vec<_> = diagnosis
        .outdated
        .iter()
        .map(|r| r.workgroup_id.as_str())
        .collect();
    assert_eq!(order, ["a", "b", "c"]);
}

#[tokio::test]
async fn reference_version_comes_from_config() {
    let store = store_with(json!({
        "subscriptions": [{"_id": "s1", "groupId": WG, "workers": [{"version": "3.0.0"}]}]
    }));
    let config = AggregatorConfig {
        reference_version: "3.0.0".into(),
        ..config()
    };
    let agg = DiagnosticsAggregator::new(store, config);
    let diagnosis = agg.worker_diagnosis(&Scope::Database).await.unwrap();
    assert_eq!(diagnosis.up_to_date.len(), 1);
    assert_eq!(diagnosis.reference_version, "3.0.0");
}

// ---------------------------------------------------------------------------
// Connectivity and snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_store_fails_connection_check() {
    let mut store = fixture();
    store.set_offline(true);
    let agg = aggregator(store);
    assert_matches!(agg.ensure_connected().await, Err(CoreError::Connection(_)));
}

#[tokio::test]
async fn snapshot_gathers_every_diagnosis() {
    let agg = aggregator(fixture());
    agg.ensure_connected().await.unwrap();

    let scope = agg.scope(1).unwrap();
    let snapshot = agg.snapshot(Platform::Qa, &scope).await.unwrap();
    assert_eq!(snapshot.datasets.no_isogeo_id, 1);
    assert_eq!(snapshot.requests.finished.count, 2);
    assert_eq!(snapshot.workers.total, 1);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["platform"], "qa");
    assert_eq!(json["scope"]["workgroup"], WG);
    assert_eq!(json["collections"]["datasets"], 3);
}
