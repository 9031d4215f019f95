use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::store::StoreError;

/// Message returned by every store-dependent endpoint when nothing is bound.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Error: Not set up to use either MySQL or RiakCS as a backing store.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("ERROR: Usage: {usage} (request: {request})")]
    Usage { usage: &'static str, request: String },

    #[error("{}", NOT_CONFIGURED_MESSAGE)]
    NotConfigured,

    #[error("Database info is not set or DB is not ready")]
    NotReady,

    #[error("ERROR: {0}")]
    BadRequest(String),

    #[error("ERROR: The RiakCS object store is read-only here; writes need a MySQL binding.")]
    ObjectStoreReadOnly,

    #[error("ERROR getting values: {0}")]
    Store(StoreError),

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotConfigured => AppError::NotConfigured,
            StoreError::NotReady => AppError::NotReady,
            StoreError::InvalidTable(_) | StoreError::InvalidRecord(_) => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::Store(other),
        }
    }
}

fn not_ready_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
    <title>Error</title>
    <link rel="stylesheet" href="/css/style.css">
</head>
<body>
    <h1>Error</h1>
    <p>Database info is not set or DB is not ready</p>
    <hr>
    <a href="/dbstatus">/dbstatus</a>
</body>
</html>"#
        .to_string()
}

fn internal_error_page(status: StatusCode) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Error {}</title>
    <link rel="stylesheet" href="/css/style.css">
</head>
<body>
    <h1>Error {}</h1>
    <p>Internal server error</p>
    <a href="/">Return to homepage</a>
</body>
</html>"#,
        status.as_u16(),
        status.as_u16()
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Usage { .. } | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            AppError::ObjectStoreReadOnly => {
                (StatusCode::NOT_IMPLEMENTED, self.to_string()).into_response()
            }
            AppError::NotConfigured => {
                tracing::warn!("Store-dependent request without a backing store");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
            }
            AppError::NotReady => {
                tracing::error!("Database is not ready");
                (StatusCode::SERVICE_UNAVAILABLE, Html(not_ready_page())).into_response()
            }
            AppError::Store(e) => {
                tracing::error!(error = %e, "Store request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AppError::Template(_) => {
                tracing::error!("Internal error: {:?}", self);
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Html(internal_error_page(status))).into_response()
            }
        }
    }
}
