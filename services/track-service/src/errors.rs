//!
//! src/errors.rs
//!
//! Defines the service error enum, conversions from library errors,
//! and the mapping of each error kind onto an HTTP status
//!
//!

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    CatalogNotFound(String),
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("catalog returned incomplete track: {0}")]
    CatalogIncomplete(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl ServiceError {
    /// Status reported to callers. Store write failures and catalog outages
    /// are server-side conditions and are not folded into 404.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_)
            | ServiceError::CatalogNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::CatalogUnavailable(_)
            | ServiceError::CatalogIncomplete(_)
            | ServiceError::Http(_)
            | ServiceError::Parse(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Persistence(_)
            | ServiceError::Config(_)
            | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self { ServiceError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self { ServiceError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self { ServiceError::Persistence(e.to_string()) }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "http.error");
        } else {
            tracing::debug!(status = %status, error = %self, "http.reject");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
