//! MongoDB-backed [`DocumentStore`].

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use scanfme_core::error::CoreError;
use scanfme_core::store::{
    Condition, Document, DocumentStore, Filter, FindOptions, SortDirection, StoreError,
};
use serde_json::Value;

/// Name reported to the server in connection metadata.
const APP_NAME: &str = "scanfme-report";

/// A connected scan database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Open a client for `uri`. The database is taken from the URI path.
    ///
    /// The driver connects lazily: this only validates the connection
    /// string. Use [`DocumentStore::is_alive`] to reach the server.
    pub async fn connect(uri: &str, server_selection_timeout: Duration) -> Result<Self, CoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(server_selection_timeout);

        let client = Client::with_options(options).map_err(|e| CoreError::Connection(e.to_string()))?;
        let db = client.default_database().ok_or_else(|| {
            CoreError::InvalidArgument("The connection string must name a database".into())
        })?;

        tracing::debug!(database = %db.name(), "MongoDB client created");
        Ok(Self { client, db })
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }
}

impl DocumentStore for MongoStore {
    async fn is_alive(&self) -> bool {
        match self.client.database("admin").run_command(doc! { "ping": 1 }).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Database ping failed");
                false
            }
        }
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let query = to_bson_filter(collection, filter)?;
        self.db
            .collection::<BsonDocument>(collection)
            .count_documents(query)
            .await
            .map_err(|e| StoreError::new(collection, e.to_string()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let query = to_bson_filter(collection, filter)?;
        let coll = self.db.collection::<BsonDocument>(collection);
        let mut find = coll.find(query);
        if let Some(sort) = &options.sort {
            let direction = match sort.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            let mut order = BsonDocument::new();
            order.insert(sort.field.clone(), direction);
            find = find.sort(order);
        }
        if let Some(limit) = options.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = find
            .await
            .map_err(|e| StoreError::new(collection, e.to_string()))?;
        let docs: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::new(collection, e.to_string()))?;
        Ok(docs.into_iter().map(to_json_document).collect())
    }
}

// ---------------------------------------------------------------------------
// BSON conversion
// ---------------------------------------------------------------------------

/// Translate a [`Filter`] into a MongoDB query document.
pub fn to_bson_filter(collection: &str, filter: &Filter) -> Result<BsonDocument, StoreError> {
    let mut query = BsonDocument::new();
    for (field, condition) in filter.clauses() {
        let value = match condition {
            Condition::Eq(expected) => bson::to_bson(expected)
                .map_err(|e| StoreError::new(collection, format!("invalid filter on '{field}': {e}")))?,
            Condition::Exists(present) => Bson::Document(doc! { "$exists": *present }),
        };
        query.insert(field.clone(), value);
    }
    Ok(query)
}

/// Convert a BSON document to the store's JSON form. Object ids become their
/// hex string; other non-JSON types use relaxed extended JSON.
pub fn to_json_document(doc: BsonDocument) -> Document {
    doc.into_iter().map(|(k, v)| (k, to_json_value(v))).collect()
}

fn to_json_value(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(inner) => Value::Object(to_json_document(inner)),
        Bson::Array(items) => Value::Array(items.into_iter().map(to_json_value).collect()),
        other => other.into_relaxed_extjson(),
    }
}
