//! Backing store access.
//!
//! The database side is split along a driver/session seam: a [`Driver`] opens
//! [`Session`]s, and the [`ConnectionManager`] owns at most one session at a
//! time, reconnecting whenever it breaks. [`mysql`] is the production driver.
//! The object store side is a small read-only monitor in [`object`].

pub mod manager;
pub mod mysql;
pub mod object;
pub mod schema;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{MAX_TABLE_NAME_LEN, SAMPLE_FIELD_MAX_CHARS};

pub use manager::ConnectionManager;
pub use object::{InstanceFields, ObjectStoreMonitor};

/// Connectivity of a backing store as seen by the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made, or no store is bound
    Unconfigured,
    /// A connection attempt is in flight or about to start
    Connecting,
    /// A session is established and usable
    Connected,
    /// The last attempt failed; another one is scheduled
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unconfigured => write!(f, "unconfigured"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// A key/value row of the sample table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    pub key: String,
    pub value: String,
}

impl SampleRecord {
    /// Build a record, rejecting fields wider than the sample columns.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        let value = value.into();
        for (name, field) in [("key", &key), ("value", &value)] {
            if field.chars().count() > SAMPLE_FIELD_MAX_CHARS {
                return Err(StoreError::InvalidRecord(format!(
                    "{} must be at most {} characters",
                    name, SAMPLE_FIELD_MAX_CHARS
                )));
            }
        }
        Ok(Self { key, value })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("no backing store is configured")]
    NotConfigured,

    #[error("database is not ready")]
    NotReady,

    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The session is unusable and must be replaced
    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Query(String),

    /// The table existence check failed; the schema state is unknowable
    #[error("schema check failed: {0}")]
    SchemaCheck(String),
}

impl StoreError {
    /// Whether this error means the session must be discarded.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// Opens sessions against one configured store.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Session>, StoreError>;
}

/// One established connection. Every call is a single statement.
#[async_trait]
pub trait Session: Send {
    async fn ping(&mut self) -> Result<(), StoreError>;

    async fn table_exists(&mut self, table: &str) -> Result<bool, StoreError>;

    async fn create_sample_table(&mut self) -> Result<(), StoreError>;

    async fn insert_sample(&mut self, record: &SampleRecord) -> Result<(), StoreError>;

    /// Read the `K`/`V` columns of every row of `table`.
    async fn read_table(&mut self, table: &str) -> Result<Vec<SampleRecord>, StoreError>;
}

/// Accept only plain identifiers as table names.
///
/// Table names cannot be bound as statement parameters, so anything outside
/// `[A-Za-z0-9_$]` is refused before it reaches SQL text.
pub fn validate_table_name(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_TABLE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidTable(name.to_string()))
    }
}
