//! Unified error types.

use thiserror::Error as ThisError;
use tracing::error;

use crate::response::{IntoResponse, Response};
use crate::status::Status;

/// Infrastructure failures: binding to a port, opening the database,
/// reading the configuration.
///
/// Request-level failures (a missing row, a failed query inside a view) are
/// expressed as [`AppError`], which always becomes an HTTP response.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database connection poisoned")]
    Poisoned,

    #[error("config `{path}`: {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config: {0}")]
    InvalidConfig(String),
}

/// Failures raised while handling a single request.
#[derive(Debug, ThisError)]
pub enum AppError {
    /// The addressed row does not exist.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] Error),

    #[error("render: {0}")]
    Render(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(Error::Database(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => Response::status(Status::NotFound),
            other => {
                error!("request failed: {other}");
                Response::status(Status::InternalServerError)
            }
        }
    }
}
