//! In-memory [`DocumentStore`] backed by JSON documents.
//!
//! Serves offline snapshots (`--snapshot`) and tests. Collections can be
//! marked unavailable to simulate failing queries.

use std::collections::{HashMap, HashSet};

use scanfme_core::collections::Collection;
use scanfme_core::error::CoreError;
use scanfme_core::store::{
    compare_values, Document, DocumentStore, Filter, FindOptions, SortDirection, StoreError,
};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
    unavailable: HashSet<String>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot shaped as `{ "<collection>": [ {doc}, ... ] }`.
    ///
    /// Keys that are not registry collections are skipped.
    pub fn from_snapshot(snapshot: Value) -> Result<Self, CoreError> {
        let Value::Object(collections) = snapshot else {
            return Err(CoreError::InvalidArgument(
                "Snapshot must be a JSON object keyed by collection name".into(),
            ));
        };

        let mut store = Self::new();
        for (name, docs) in collections {
            if Collection::from_name(&name).is_none() {
                tracing::warn!(collection = %name, "Ignoring unknown collection in snapshot");
                continue;
            }
            store = store.with_json(&name, docs)?;
        }
        Ok(store)
    }

    /// Append a JSON array of documents to `collection`.
    pub fn with_json(mut self, collection: &str, docs: Value) -> Result<Self, CoreError> {
        let Value::Array(items) = docs else {
            return Err(CoreError::InvalidArgument(format!(
                "Snapshot collection '{collection}' must be an array of documents"
            )));
        };
        for (idx, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(doc) => self.insert(collection, doc),
                _ => {
                    return Err(CoreError::InvalidArgument(format!(
                        "Document {idx} of '{collection}' is not a JSON object"
                    )))
                }
            }
        }
        Ok(self)
    }

    pub fn insert(&mut self, collection: &str, doc: Document) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    /// Make every query on `collection` fail.
    pub fn mark_unavailable(&mut self, collection: &str) {
        self.unavailable.insert(collection.to_string());
    }

    /// Simulate a lost connection: the probe fails and so does every query.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn documents(&self, collection: &str) -> Result<&[Document], StoreError> {
        if self.offline {
            return Err(StoreError::new(collection, "store is offline"));
        }
        if self.unavailable.contains(collection) {
            return Err(StoreError::new(collection, "collection unavailable"));
        }
        Ok(self
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }
}

impl DocumentStore for MemoryStore {
    async fn is_alive(&self) -> bool {
        !self.offline
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let docs = self.documents(collection)?;
        Ok(docs.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut matched: Vec<Document> = self
            .documents(collection)?
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();

        if let Some(sort) = &options.sort {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = options.limit {
            matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_json(
                "requests",
                json!([
                    {"_id": "r1", "groupId": "a", "state": "broken"},
                    {"_id": "r3", "groupId": "b", "state": "broken"},
                    {"_id": "r2", "groupId": "a", "state": "finished"},
                ]),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn count_applies_filter() {
        let store = store();
        let broken = Filter::new().eq("state", "broken");
        assert_eq!(store.count("requests", &broken).await.unwrap(), 2);
        assert_eq!(store.count("requests", &Filter::new()).await.unwrap(), 3);
        assert_eq!(store.count("sessions", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_sorts_and_limits() {
        let store = store();
        let options = FindOptions::sorted("_id", SortDirection::Descending).limit(2);
        let docs = store.find("requests", &Filter::new(), &options).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["r3", "r2"]);
    }

    #[tokio::test]
    async fn unavailable_collection_fails_queries() {
        let mut store = store();
        store.mark_unavailable("requests");
        let err = store.count("requests", &Filter::new()).await.unwrap_err();
        assert_eq!(err.collection, "requests");
        assert!(store.is_alive().await);
    }

    #[tokio::test]
    async fn offline_store_reports_not_alive() {
        let mut store = store();
        store.set_offline(true);
        assert!(!store.is_alive().await);
        assert!(store.find("requests", &Filter::new(), &FindOptions::default()).await.is_err());
    }

    #[test]
    fn snapshot_skips_unknown_collections() {
        let store = MemoryStore::from_snapshot(json!({
            "datasets": [{"_id": "d1"}],
            "users": [{"_id": "u1"}]
        }))
        .unwrap();
        assert_eq!(store.collections.len(), 1);
    }

    #[test]
    fn snapshot_rejects_non_object_documents() {
        assert_matches!(
            MemoryStore::from_snapshot(json!({"datasets": [1, 2]})),
            Err(CoreError::InvalidArgument(_))
        );
        assert_matches!(
            MemoryStore::from_snapshot(json!([])),
            Err(CoreError::InvalidArgument(_))
        );
    }
}
