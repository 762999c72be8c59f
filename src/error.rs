//! Typed errors and HTTP mapping.

use crate::response::fail_code;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by resource handlers. Messages are part of the wire format.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("no resource access")]
    NoResourceAccess,
    #[error("no resource found")]
    NoResourceFound,
    #[error("database problem")]
    Database,
    #[error("unable to handle this request")]
    NoBindType,
    #[error("bad data")]
    InvalidData,
    #[error("bad id")]
    InvalidId,
}

impl ResourceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResourceError::NoResourceAccess => StatusCode::FORBIDDEN,
            ResourceError::NoResourceFound => StatusCode::NOT_FOUND,
            ResourceError::Database | ResourceError::NoBindType => StatusCode::INTERNAL_SERVER_ERROR,
            ResourceError::InvalidData | ResourceError::InvalidId => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<sqlx::Error> for ResourceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ResourceError::NoResourceFound,
            other => {
                tracing::error!(error = %other, "database error");
                ResourceError::Database
            }
        }
    }
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        fail_code(self.status(), self).into_response()
    }
}

/// Bootstrap errors: connecting, migrating, registering and serving.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migrating table {table}: {source}")]
    Migration {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("resource {0} requires a database, but no DSN is configured")]
    DatabaseRequired(String),
    #[error("invalid model {model}: {reason}")]
    InvalidModel { model: &'static str, reason: String },
    #[error("config: {0}")]
    Config(String),
    #[error("tls: {0}")]
    Tls(String),
    #[error("template: {0}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Only reached from handlers (e.g. template rendering); details stay in the log.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        fail_code(StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}
