//! services/coach_api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::http::StatusCode;
use run_coach_core::{error::CoachError, ports::PortError};

/// The primary error type for the `coach_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An operation the coaching engine refused because it would break an invariant.
    #[error("Rejected operation: {0}")]
    Rejected(#[from] CoachError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Port(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Lets handlers returning `(StatusCode, String)` use `?` on `ApiError`.
impl From<ApiError> for (StatusCode, String) {
    fn from(error: ApiError) -> Self {
        (error.status_code(), error.to_string())
    }
}
