use std::sync::Arc;

use crate::papers::resolver::MetadataSources;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, in-memory for local runs and tests.
    pub store: Arc<dyn Store>,
    pub sources: MetadataSources,
}
