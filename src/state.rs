//! Shared application state for request handlers.

use std::sync::Arc;
use tera::Tera;

use crate::config::AppConfig;
use crate::store::{ConnectionManager, ObjectStoreMonitor};

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// The connection manager is the only owner of the database session; handlers
/// reach the store exclusively through it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tera: Arc<Tera>,
    pub store: ConnectionManager,
    /// Present only in object store mode
    pub object_store: Option<ObjectStoreMonitor>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        tera: Tera,
        store: ConnectionManager,
        object_store: Option<ObjectStoreMonitor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tera: Arc::new(tera),
            store,
            object_store,
        }
    }
}
