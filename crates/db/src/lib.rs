//! Store access for the scan database: connection strings, the MongoDB and
//! in-memory stores, and the diagnostics aggregator running on top of them.

use std::time::Duration;

use scanfme_core::error::CoreError;
use scanfme_core::store::DocumentStore;
use scanfme_core::types::Platform;

pub mod aggregator;
pub mod memory;
pub mod mongo;
pub mod uri;

pub use aggregator::{AggregatorConfig, DiagnosticsAggregator, DEFAULT_WORKER_VERSION};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use uri::ConnectionSettings;

/// Connect to the database of `platform` and check it answers.
pub async fn connect(
    platform: Platform,
    settings: &ConnectionSettings,
    server_selection_timeout: Duration,
) -> Result<MongoStore, CoreError> {
    let uri = uri::build_uri(platform, settings)?;
    tracing::debug!(
        platform = %platform,
        uri = %uri::redacted_uri(platform, settings)?,
        "Connecting to database",
    );

    let store = MongoStore::connect(&uri, server_selection_timeout).await?;
    health_check(&store).await?;
    tracing::info!(platform = %platform, database = store.database_name(), "Database connection established");
    Ok(store)
}

/// Fail with [`CoreError::Connection`] unless `store` answers its probe.
pub async fn health_check<S: DocumentStore>(store: &S) -> Result<(), CoreError> {
    if store.is_alive().await {
        Ok(())
    } else {
        Err(CoreError::Connection("Database did not answer the liveness probe".into()))
    }
}
