//! Configuration loading and constants.
//!
//! Settings come from an optional TOML file and are then overridden by the
//! platform environment: `VCAP_SERVICES` selects the backing store,
//! `VCAP_APP_PORT`/`PORT` override the listen port and `CF_INSTANCE_INDEX`
//! namespaces object-store keys. `AppConfig` is the root configuration struct.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use const_format::formatcp;
use serde::Deserialize;

// =============================================================================
// HTTP Response Cache Control
// =============================================================================

/// Static assets - moderate cache, they only change on redeploy
pub const HTTP_CACHE_STATIC_MAX_AGE: u32 = 3600;

pub const CACHE_CONTROL_STATIC: &str = formatcp!("public, max-age={}", HTTP_CACHE_STATIC_MAX_AGE);

/// Diagnostic pages must always reflect the live store
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

// =============================================================================
// Sample Data
// =============================================================================

/// Table holding the sample records
pub const SAMPLE_TABLE: &str = "SampleData";

/// Width of both sample columns (`VARCHAR(20)`)
pub const SAMPLE_FIELD_MAX_CHARS: usize = 20;

/// Timestamp written as the value of every sample record
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Longest identifier MySQL accepts for a table name
pub const MAX_TABLE_NAME_LEN: usize = 64;

// =============================================================================
// Service Binding
// =============================================================================

/// Environment variable carrying the JSON service binding
pub const SERVICES_ENV: &str = "VCAP_SERVICES";

/// Environment variables overriding the listen port, in priority order
pub const PORT_ENVS: [&str; 2] = ["VCAP_APP_PORT", "PORT"];

/// Environment variable carrying this instance's index
pub const INSTANCE_INDEX_ENV: &str = "CF_INSTANCE_INDEX";

/// Service label of the relational database binding
pub const DATABASE_SERVICE_LABEL: &str = "p-mysql";

/// Service label of the object store binding
pub const OBJECT_STORE_SERVICE_LABEL: &str = "riakcs";

// =============================================================================
// Retry and Timeout Defaults
// =============================================================================

/// Delay in seconds between database connect attempts
pub const DATABASE_RECONNECT_DELAY_SECS: u64 = 1;

/// Upper bound in seconds on a single database connect attempt
pub const DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Seconds between keepalive pings on an idle database session; 0 disables them
pub const DATABASE_KEEPALIVE_INTERVAL_SECS: u64 = 5;

/// Delay in seconds between object store connect attempts
pub const OBJECT_STORE_RECONNECT_DELAY_SECS: u64 = 3;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Configuration file used when `--config` is not given and the file exists
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Directory for static files
pub const STATIC_DIR: &str = "static";

/// Default listen address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port when no override is present
pub const DEFAULT_PORT: u16 = 8080;

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "acceptance=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Database connection tuning
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Object store connection tuning
    #[serde(default)]
    pub object_store: ObjectStoreSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Backing store selected from the service binding, never read from the file
    #[serde(skip)]
    pub backing_store: BackingStore,
    /// Service label that was bound but lost out to the selected store
    #[serde(skip)]
    pub shadowed_service: Option<&'static str>,
    /// Index of this instance among its siblings
    #[serde(skip)]
    pub instance_index: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Directory served for every path no handler claims
    #[serde(default = "HttpServerConfig::default_static_dir")]
    pub static_dir: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            static_dir: Self::default_static_dir(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_static_dir() -> String {
        STATIC_DIR.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    #[serde(default = "DatabaseSettings::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Ping an idle session this often so a dead server is noticed without traffic
    #[serde(default = "DatabaseSettings::default_keepalive_interval")]
    pub keepalive_interval_seconds: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_seconds: Self::default_reconnect_delay(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            keepalive_interval_seconds: Self::default_keepalive_interval(),
        }
    }
}

impl DatabaseSettings {
    fn default_reconnect_delay() -> u64 {
        DATABASE_RECONNECT_DELAY_SECS
    }

    fn default_connect_timeout() -> u64 {
        DATABASE_CONNECT_TIMEOUT_SECS
    }

    fn default_keepalive_interval() -> u64 {
        DATABASE_KEEPALIVE_INTERVAL_SECS
    }

    /// Keepalive period, `None` when disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_seconds > 0)
            .then(|| Duration::from_secs(self.keepalive_interval_seconds))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreSettings {
    #[serde(default = "ObjectStoreSettings::default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_seconds: Self::default_reconnect_delay(),
        }
    }
}

impl ObjectStoreSettings {
    fn default_reconnect_delay() -> u64 {
        OBJECT_STORE_RECONNECT_DELAY_SECS
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }
}

/// The one backing store this process exercises, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BackingStore {
    /// No usable binding; store-dependent endpoints report it
    #[default]
    None,
    /// Relational database reachable through a connection URI
    Database { uri: String },
    /// Object store described by an opaque credential bundle
    ObjectStore { credentials: ObjectStoreCredentials },
}

impl BackingStore {
    pub fn kind(&self) -> &'static str {
        match self {
            BackingStore::None => "none",
            BackingStore::Database { .. } => "database",
            BackingStore::ObjectStore { .. } => "object_store",
        }
    }
}

/// Object store credentials. Only `uri` is interpreted; the rest is kept for display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectStoreCredentials {
    pub uri: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of reading `VCAP_SERVICES`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceBinding {
    pub store: BackingStore,
    /// Label of a bound service that was ignored in favour of `store`
    pub shadowed: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ServiceInstance {
    credentials: serde_json::Value,
}

/// Select the backing store from a `VCAP_SERVICES` document.
///
/// The database binding wins when both kinds are bound.
pub fn parse_service_binding(raw: &str) -> Result<ServiceBinding, ConfigError> {
    let services: HashMap<String, Vec<ServiceInstance>> = serde_json::from_str(raw)?;

    let database = services
        .get(DATABASE_SERVICE_LABEL)
        .and_then(|instances| instances.first());
    let object_store = services
        .get(OBJECT_STORE_SERVICE_LABEL)
        .and_then(|instances| instances.first());

    if let Some(instance) = database {
        let uri = instance
            .credentials
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "{} binding has no credentials.uri",
                    DATABASE_SERVICE_LABEL
                ))
            })?;
        return Ok(ServiceBinding {
            store: BackingStore::Database {
                uri: uri.to_string(),
            },
            shadowed: object_store.map(|_| OBJECT_STORE_SERVICE_LABEL),
        });
    }

    let store = match object_store {
        Some(instance) => BackingStore::ObjectStore {
            credentials: serde_json::from_value(instance.credentials.clone())?,
        },
        None => BackingStore::None,
    };
    Ok(ServiceBinding {
        store,
        shadowed: None,
    })
}

impl AppConfig {
    /// Load the TOML file, if any, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply platform environment overrides.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        if let Some(raw) = vars.get(SERVICES_ENV) {
            let binding = parse_service_binding(raw)?;
            self.backing_store = binding.store;
            self.shadowed_service = binding.shadowed;
        }

        if let Some((name, value)) = PORT_ENVS
            .iter()
            .find_map(|name| vars.get(*name).map(|value| (*name, value)))
        {
            self.http.port = value.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{} is not a valid port: {:?}", name, value))
            })?;
        }

        if let Some(value) = vars.get(INSTANCE_INDEX_ENV) {
            self.instance_index = value.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "{} is not a valid instance index: {:?}",
                    INSTANCE_INDEX_ENV, value
                ))
            })?;
        }

        Ok(())
    }

    /// Hash key holding this instance's object store fields
    pub fn instance_hash_key(&self) -> String {
        format!("Instance_{}_Hash", self.instance_index)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to parse service binding: {0}")]
    Binding(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
