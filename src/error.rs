//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Startup errors: the process cannot serve anything without a document.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid source {source_name}: {reason}")]
    InvalidSource { source_name: String, reason: String },
    #[error("source unavailable {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },
}

impl SourceError {
    pub fn invalid(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::InvalidSource {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::SourceUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Background failures. Logged, never surfaced to a client.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("flush {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watch reload {path}: {reason}")]
    WatchReload { path: PathBuf, reason: String },
    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Anything that stops the server from starting; the binary exits with status 1.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("watch: {0}")]
    Watch(#[from] notify::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("malformed body: {0}")]
    MalformedBody(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "malformed_body"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}
