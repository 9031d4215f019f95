//! Sample record writes.

use axum::{
    extract::{Query, State},
    http::Uri,
    response::Html,
};
use chrono::Local;
use serde::Deserialize;
use tracing::instrument;

use crate::config::TIMESTAMP_FORMAT;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::SampleRecord;

pub const WRITE_USAGE: &str = "/write?key=foo";

#[derive(Debug, Deserialize)]
pub struct WriteParams {
    key: Option<String>,
}

/// Insert `(key, now)` into the sample table.
#[instrument(name = "write::write", skip(state, params))]
pub async fn write(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<WriteParams>,
) -> Result<Html<String>, AppError> {
    let Some(key) = params.key.filter(|key| !key.is_empty()) else {
        return Err(AppError::Usage {
            usage: WRITE_USAGE,
            request: uri.to_string(),
        });
    };
    if state.object_store.is_some() {
        return Err(AppError::ObjectStoreReadOnly);
    }
    if !state.store.is_configured() {
        return Err(AppError::NotConfigured);
    }

    tracing::info!(key = %key, "Received request to write key");
    let record = SampleRecord::new(key, Local::now().format(TIMESTAMP_FORMAT).to_string())?;
    state.store.insert_sample(&record).await?;

    let mut context = tera::Context::new();
    context.insert("key", &record.key);
    context.insert("value", &record.value);
    Ok(Html(state.tera.render("write.html", &context)?))
}
