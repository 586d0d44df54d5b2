//! crates/run_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) the coaching engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the concrete completion and vision providers.

use async_trait::async_trait;

use crate::domain::ReportedWorkout;
use crate::request::{CompletionRequest, CompletionResponse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// Every variant is treated as a failure of the external service, never of the caller.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("The external service did not answer within {0} seconds")]
    Timeout(u64),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait PlanCompletionService: Send + Sync {
    /// Sends a structured plan request and returns the parsed reply.
    async fn complete_plan(&self, request: &CompletionRequest) -> PortResult<CompletionResponse>;
}

#[async_trait]
pub trait WorkoutExtractionService: Send + Sync {
    /// Reads workout details from an activity-tracker screenshot.
    async fn extract_workout(&self, image: &[u8], content_type: &str) -> PortResult<ReportedWorkout>;
}
