//! Static file serving for unmatched paths.
//!
//! Anything the router does not claim is looked up under the configured
//! static directory. Missing files get the static handler's own 404.

use tower_http::services::ServeDir;

/// Create the static file service rooted at `dir`.
///
/// Directory requests are answered with the directory's `index.html`.
pub fn create_static_service(dir: &str) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(true)
}
