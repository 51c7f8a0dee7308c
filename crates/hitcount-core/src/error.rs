//! Shared error type across hitcount crates.

use r2d2_sqlite::rusqlite::{self, ErrorCode};
use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid configuration or input.
    BadRequest,
    /// Request was abandoned before the store finished.
    Cancelled,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Cancelled => "CANCELLED",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HitError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum HitError {
    /// Begin, read, write, commit or pool checkout failed.
    #[error("storage: {0}")]
    Storage(String),
    /// The running statement was interrupted; the transaction rolled back.
    #[error("storage call interrupted")]
    Interrupted,
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl HitError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            HitError::Config(_) => ClientCode::BadRequest,
            HitError::Interrupted => ClientCode::Cancelled,
            HitError::Storage(_) | HitError::Internal(_) => ClientCode::Internal,
        }
    }
}

impl From<rusqlite::Error> for HitError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => HitError::Interrupted,
            _ => HitError::Storage(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for HitError {
    fn from(e: r2d2::Error) -> Self {
        HitError::Storage(format!("pool: {e}"))
    }
}
