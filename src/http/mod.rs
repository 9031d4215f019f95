//! HTTP plumbing shared by the router and the entry point.
//!
//! - Static file fallback for every path no handler claims
//! - Graceful shutdown on SIGTERM/SIGINT

pub mod shutdown;
pub mod static_files;

pub use shutdown::shutdown_signal;
pub use static_files::create_static_service;
