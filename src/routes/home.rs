//! Home page: the sample table, or a pointer elsewhere when the store can't show one.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use chrono::Local;
use tracing::instrument;

use crate::config::{BackingStore, SAMPLE_TABLE, TIMESTAMP_FORMAT};
use crate::error::AppError;
use crate::state::AppState;

/// Render the sample table rows in database mode.
#[instrument(name = "home::index", skip(state), fields(store = state.config.backing_store.kind()))]
pub async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    match &state.config.backing_store {
        BackingStore::Database { uri } => {
            let records = state.store.read_table(SAMPLE_TABLE).await?;

            let mut context = tera::Context::new();
            context.insert("now", &Local::now().format(TIMESTAMP_FORMAT).to_string());
            context.insert("records", &records);
            context.insert("connection_info", uri);

            let html = state.tera.render("values.html", &context)?;
            Ok(Html(html).into_response())
        }
        BackingStore::ObjectStore { .. } => {
            let Some(monitor) = state.object_store.as_ref() else {
                return Err(AppError::NotConfigured);
            };

            let mut context = tera::Context::new();
            context.insert("status", &monitor.state().to_string());
            context.insert("hash_key", monitor.hash_key());
            context.insert("fields", &monitor.fields().await);

            let html = state.tera.render("object_store.html", &context)?;
            Ok(Html(html).into_response())
        }
        BackingStore::None => Err(AppError::NotConfigured),
    }
}
