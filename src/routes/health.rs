//! Process liveness probe.
//!
//! Answers without touching the backing store, so a platform health check
//! keeps passing while the database is reconnecting. Use `/dbstatus` or
//! `/ping` for store connectivity.

/// Always `ok` once the listener is up.
pub async fn health() -> &'static str {
    "ok"
}
