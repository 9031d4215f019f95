//! JSON API: table reads and the connectivity flag.

use axum::{
    extract::{Query, State},
    http::Uri,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::{ConnectionState, ObjectStoreMonitor};

pub const READ_USAGE: &str = "/json/read?table=name";

#[derive(Debug, Deserialize)]
pub struct ReadParams {
    table: Option<String>,
}

/// Every `(K, V)` row of the requested table as `[[key, value], ...]`.
///
/// In object store mode the only table is this instance's hash, read as
/// `[[field, value], ...]`.
#[instrument(name = "json::read", skip(state, params))]
pub async fn read(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<ReadParams>,
) -> Result<Json<Vec<(String, String)>>, AppError> {
    let Some(table) = params.table.filter(|table| !table.is_empty()) else {
        return Err(AppError::Usage {
            usage: READ_USAGE,
            request: uri.to_string(),
        });
    };

    tracing::info!(table = %table, "Received request to read table");
    if let Some(monitor) = state.object_store.as_ref() {
        return read_instance_hash(monitor, &table).await.map(Json);
    }

    let records = state.store.read_table(&table).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|record| (record.key, record.value))
            .collect(),
    ))
}

async fn read_instance_hash(
    monitor: &ObjectStoreMonitor,
    table: &str,
) -> Result<Vec<(String, String)>, AppError> {
    if table != monitor.hash_key() {
        return Err(AppError::BadRequest(format!(
            "the object store only holds {}",
            monitor.hash_key()
        )));
    }
    if monitor.state() != ConnectionState::Connected {
        return Err(AppError::NotReady);
    }
    Ok(monitor.fields().await.into_rows())
}

/// `{"dbStatus": bool}`
pub async fn dbstatus(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "dbStatus": state.store.is_connected() }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{AppConfig, BackingStore, ObjectStoreCredentials};
    use crate::routes::create_router;
    use crate::store::{ConnectionManager, InstanceFields};
    use crate::templates::init_templates;

    use super::*;

    fn object_store_state() -> (AppState, ObjectStoreMonitor) {
        let credentials = ObjectStoreCredentials {
            uri: Some("redis://127.0.0.1:1".to_string()),
            extra: serde_json::Map::new(),
        };
        let config = AppConfig {
            backing_store: BackingStore::ObjectStore {
                credentials: credentials.clone(),
            },
            ..AppConfig::default()
        };
        let monitor = ObjectStoreMonitor::new(
            &credentials,
            config.instance_hash_key(),
            Duration::from_millis(10),
        );
        let state = AppState::new(
            config,
            init_templates().unwrap(),
            ConnectionManager::unconfigured(),
            Some(monitor.clone()),
        );
        (state, monitor)
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_read_instance_hash_once_connected() {
        let (state, monitor) = object_store_state();
        monitor
            .set_fields(InstanceFields {
                last_key_updated: Some("durable".to_string()),
                last_update: Some("2024-01-01 10:00".to_string()),
            })
            .await;

        let (status, body) = get(state, "/json/read?table=Instance_0_Hash").await;
        assert_eq!(status, StatusCode::OK);
        let rows: Vec<(String, String)> = serde_json::from_str(&body).unwrap();
        assert_eq!(
            rows,
            vec![
                ("lastKeyUpdated".to_string(), "durable".to_string()),
                ("lastUpdate".to_string(), "2024-01-01 10:00".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_other_table_in_object_store_mode() {
        let (state, _monitor) = object_store_state();

        let (status, body) = get(state, "/json/read?table=SampleData").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Instance_0_Hash"));
    }

    #[tokio::test]
    async fn test_read_instance_hash_before_connect_is_not_ready() {
        let (state, _monitor) = object_store_state();

        let (status, _body) = get(state, "/json/read?table=Instance_0_Hash").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
