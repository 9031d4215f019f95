//! Database liveness probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::state::AppState;
use crate::store::StoreError;

pub const NO_CONNECTION_MESSAGE: &str =
    "I'm sorry, Dave, I can't do that. No connection to database.";

pub const PING_OK_MESSAGE: &str = "MySQL ping successful.";

/// Ping the database. A failed ping makes the manager reconnect.
#[instrument(name = "ping::ping", skip(state))]
pub async fn ping(State(state): State<AppState>) -> Response {
    if !state.store.is_connected() {
        return (StatusCode::SERVICE_UNAVAILABLE, NO_CONNECTION_MESSAGE).into_response();
    }

    match state.store.ping().await {
        Ok(()) => PING_OK_MESSAGE.into_response(),
        Err(StoreError::NotConfigured | StoreError::NotReady) => {
            (StatusCode::SERVICE_UNAVAILABLE, NO_CONNECTION_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "MySQL connection error");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("MySQL connection error: {}", e),
            )
                .into_response()
        }
    }
}
