//! Object store monitor.
//!
//! In object store mode the service only connects and reads two per-instance
//! fields, `lastKeyUpdated` and `lastUpdate`, from the hash
//! `Instance_<index>_Hash`. Nothing in this service writes them. Failed
//! attempts are retried on a fixed delay until one succeeds.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::config::ObjectStoreCredentials;

use super::{ConnectionState, StoreError};

pub const LAST_KEY_FIELD: &str = "lastKeyUpdated";
pub const LAST_UPDATE_FIELD: &str = "lastUpdate";

/// Fields read from this instance's hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceFields {
    pub last_key_updated: Option<String>,
    pub last_update: Option<String>,
}

impl InstanceFields {
    /// `(field, value)` pairs for the fields that are set.
    pub fn into_rows(self) -> Vec<(String, String)> {
        [
            (LAST_KEY_FIELD, self.last_key_updated),
            (LAST_UPDATE_FIELD, self.last_update),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name.to_string(), value)))
        .collect()
    }
}

struct Inner {
    uri: Option<String>,
    hash_key: String,
    retry_delay: Duration,
    state: watch::Sender<ConnectionState>,
    fields: RwLock<InstanceFields>,
}

#[derive(Clone)]
pub struct ObjectStoreMonitor {
    inner: Arc<Inner>,
}

fn connection_error(err: redis::RedisError) -> StoreError {
    StoreError::Connection(err.to_string())
}

impl ObjectStoreMonitor {
    pub fn new(credentials: &ObjectStoreCredentials, hash_key: String, retry_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unconfigured);
        Self {
            inner: Arc::new(Inner {
                uri: credentials.uri.clone(),
                hash_key,
                retry_delay,
                state,
                fields: RwLock::new(InstanceFields::default()),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn hash_key(&self) -> &str {
        &self.inner.hash_key
    }

    /// Fields as last read; empty until the first successful connect.
    pub async fn fields(&self) -> InstanceFields {
        self.inner.fields.read().await.clone()
    }

    /// Publish freshly read fields and mark the store connected.
    pub(crate) async fn set_fields(&self, fields: InstanceFields) {
        *self.inner.fields.write().await = fields;
        self.inner.state.send_replace(ConnectionState::Connected);
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.run().await })
    }

    #[instrument(name = "object_store.monitor", skip_all, fields(hash = %self.inner.hash_key))]
    async fn run(self) {
        let Some(uri) = self.inner.uri.clone() else {
            self.inner.state.send_replace(ConnectionState::Failed);
            tracing::error!("Object store credentials have no uri, not connecting");
            return;
        };

        loop {
            self.inner.state.send_replace(ConnectionState::Connecting);
            match self.read_fields(&uri).await {
                Ok(fields) => {
                    tracing::info!(
                        last_key_updated = ?fields.last_key_updated,
                        last_update = ?fields.last_update,
                        "Object store ready"
                    );
                    self.set_fields(fields).await;
                    return;
                }
                Err(e) => {
                    self.inner.state.send_replace(ConnectionState::Failed);
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = self.inner.retry_delay.as_millis() as u64,
                        "Object store connection failed, will try again"
                    );
                    tokio::time::sleep(self.inner.retry_delay).await;
                }
            }
        }
    }

    async fn read_fields(&self, uri: &str) -> Result<InstanceFields, StoreError> {
        let client = redis::Client::open(uri).map_err(connection_error)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connection_error)?;

        let last_key_updated: Option<String> = redis::cmd("HGET")
            .arg(&self.inner.hash_key)
            .arg(LAST_KEY_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        let last_update: Option<String> = redis::cmd("HGET")
            .arg(&self.inner.hash_key)
            .arg(LAST_UPDATE_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;

        Ok(InstanceFields {
            last_key_updated,
            last_update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(uri: Option<&str>) -> ObjectStoreCredentials {
        ObjectStoreCredentials {
            uri: uri.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_monitor_starts_unconfigured_and_empty() {
        let monitor = ObjectStoreMonitor::new(
            &credentials(Some("redis://127.0.0.1:6379")),
            "Instance_0_Hash".to_string(),
            Duration::from_millis(10),
        );
        assert_eq!(monitor.state(), ConnectionState::Unconfigured);
        assert_eq!(monitor.hash_key(), "Instance_0_Hash");
        assert_eq!(monitor.fields().await, InstanceFields::default());
    }

    #[test]
    fn test_instance_fields_as_rows_skip_unset() {
        let fields = InstanceFields {
            last_key_updated: Some("durable".to_string()),
            last_update: None,
        };
        assert_eq!(
            fields.into_rows(),
            vec![("lastKeyUpdated".to_string(), "durable".to_string())]
        );
        assert!(InstanceFields::default().into_rows().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_without_uri_fails_without_retrying() {
        let monitor = ObjectStoreMonitor::new(
            &credentials(None),
            "Instance_0_Hash".to_string(),
            Duration::from_millis(10),
        );
        monitor.spawn().await.unwrap();
        assert_eq!(monitor.state(), ConnectionState::Failed);
    }
}
