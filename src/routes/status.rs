//! Plain-text connectivity flag.

use axum::extract::State;

use crate::state::AppState;

/// `true` while the database session is established, `false` otherwise.
pub async fn dbstatus(State(state): State<AppState>) -> String {
    state.store.is_connected().to_string()
}
