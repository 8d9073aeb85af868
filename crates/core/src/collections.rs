//! Registry of the scan database collections the diagnostics read.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Workgroup foreign key present on every scoped document.
pub const FIELD_WORKGROUP: &str = "groupId";
/// Document primary key.
pub const FIELD_ID: &str = "_id";
/// Identifier assigned to a dataset once matched with the catalog.
pub const FIELD_EXTERNAL_ID: &str = "isogeo_id";
/// Dataset layer name.
pub const FIELD_FEATURE_TYPE: &str = "featureType";
/// Request lifecycle state.
pub const FIELD_STATE: &str = "state";
/// Request error payload.
pub const FIELD_ERROR: &str = "err";
/// Installed workers array on a subscription.
pub const FIELD_WORKERS: &str = "workers";
/// Worker display name.
pub const FIELD_WORKER_NAME: &str = "givenName";
/// Worker software version.
pub const FIELD_WORKER_VERSION: &str = "version";

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Datasets,
    Entrypoints,
    Geodatabases,
    Procdatasets,
    Requests,
    Sessions,
    Subscriptions,
}

impl Collection {
    /// Collection name in the database.
    pub fn name(self) -> &'static str {
        match self {
            Self::Datasets => "datasets",
            Self::Entrypoints => "entrypoints",
            Self::Geodatabases => "geodatabases",
            Self::Procdatasets => "procdatasets",
            Self::Requests => "requests",
            Self::Sessions => "sessions",
            Self::Subscriptions => "subscriptions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_COLLECTIONS.iter().copied().find(|c| c.name() == name)
    }
}

/// Every collection, in registry order.
pub const ALL_COLLECTIONS: [Collection; 7] = [
    Collection::Datasets,
    Collection::Entrypoints,
    Collection::Geodatabases,
    Collection::Procdatasets,
    Collection::Requests,
    Collection::Sessions,
    Collection::Subscriptions,
];

/// A registry entry: collection plus what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub collection: Collection,
    pub abbreviation: &'static str,
    pub description: &'static str,
}

/// Ordered, read-only set of collections queried by the diagnostics.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    entries: Vec<CollectionInfo>,
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl CollectionRegistry {
    /// The seven collections of the scan database.
    pub fn standard() -> Self {
        let entries = ALL_COLLECTIONS
            .iter()
            .map(|&collection| {
                let (abbreviation, description) = match collection {
                    Collection::Datasets => ("DS", "where metadata about scanned datasets are stored"),
                    Collection::Entrypoints => ("EP", "list of clients entrypoints"),
                    Collection::Geodatabases => ("GD", "flat databases"),
                    Collection::Procdatasets => ("PD", "history of all datasets which have been scanned"),
                    Collection::Requests => ("RQ", "list of requests sent to the super worker"),
                    Collection::Sessions => ("SS", "active sessions"),
                    Collection::Subscriptions => ("SB", "worker clients registered"),
                };
                CollectionInfo {
                    collection,
                    abbreviation,
                    description,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CollectionInfo] {
        &self.entries
    }

}
