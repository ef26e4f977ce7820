//! Error model shared by connection, engine and identity layers.
//!
//! # Responsibility
//! - Give lifecycle failures a stable string code plus the original cause.
//! - Pass statement-level driver errors through without re-wrapping.
//!
//! # Invariants
//! - Only open/close/schema bootstrap wrap errors into `Connection`.
//! - A missing row is `Ok(None)`, never an error.

use std::error::Error as StdError;
use thiserror::Error;

/// Stable error codes attached to lifecycle errors.
pub mod codes {
    pub const CONNECT_FAILED: &str = "CONNECT_FAILED";
    pub const DISCONNECT_FAILED: &str = "DISCONNECT_FAILED";
    pub const NO_CONNECTION: &str = "NO_CONNECTION";
    pub const NOT_OPENED: &str = "NOT_OPENED";
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

type Cause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("[{code}] {message}")]
    Connection {
        code: &'static str,
        message: String,
        correlation_id: Option<String>,
        #[source]
        source: Option<Cause>,
    },

    #[error("[{code}] {message}")]
    InvalidState {
        code: &'static str,
        message: String,
        correlation_id: Option<String>,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("row conversion failed: {message}")]
    Conversion { message: String },
}

impl PersistenceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(
        correlation_id: Option<&str>,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Connection {
            code,
            message: message.into(),
            correlation_id: correlation_id.map(str::to_string),
            source: None,
        }
    }

    pub fn invalid_state(
        correlation_id: Option<&str>,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            code,
            message: message.into(),
            correlation_id: correlation_id.map(str::to_string),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Attaches a cause to a `Connection` error. Other variants are returned as-is.
    pub fn with_cause(self, cause: impl Into<Cause>) -> Self {
        match self {
            Self::Connection {
                code,
                message,
                correlation_id,
                ..
            } => Self::Connection {
                code,
                message,
                correlation_id,
                source: Some(cause.into()),
            },
            other => other,
        }
    }

    /// Returns the stable code for lifecycle errors.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Connection { code, .. } | Self::InvalidState { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::conversion(value.to_string())
    }
}
