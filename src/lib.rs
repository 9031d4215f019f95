//! Core services acceptance: a diagnostic web app for a bound data service.
//!
//! Verifies that the backing store named by the platform service binding is
//! reachable, writable and durable across upgrades. The database session is
//! owned by a [`store::ConnectionManager`] that reconnects on its own; the
//! HTTP routes only read its state and run single statements through it.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod templates;

pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
