//! crates/model_test_core/src/ports.rs
//!
//! Defines the service contracts (traits) the attempt state machine depends on.
//! These traits form the boundary of the hexagonal architecture, so the core
//! never knows whether it talks to the HTTP backend or to an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AttemptId, AttemptSummary, AuthContext, QuestionId, ResumedAttempt, StartedAttempt,
    SubmissionReceipt, SubmitPayload, TestDefinition, TestId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g. network, HTTP).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The model test backend, as seen by one authenticated user.
#[async_trait]
pub trait ModelTestService: Send + Sync {
    async fn get_test(&self, auth: &AuthContext, test_id: &TestId) -> PortResult<TestDefinition>;

    /// Looks for a non-terminal attempt of `test_id` owned by the session's user.
    async fn find_in_progress_attempt(
        &self,
        auth: &AuthContext,
        test_id: &TestId,
    ) -> PortResult<Option<AttemptId>>;

    async fn start_attempt(
        &self,
        auth: &AuthContext,
        test_id: &TestId,
    ) -> PortResult<StartedAttempt>;

    async fn resume_attempt(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
    ) -> PortResult<ResumedAttempt>;

    async fn save_answer(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
        question_id: &QuestionId,
        choice: usize,
    ) -> PortResult<()>;

    async fn submit_attempt(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
        payload: &SubmitPayload,
    ) -> PortResult<SubmissionReceipt>;

    async fn list_history(&self, auth: &AuthContext) -> PortResult<Vec<AttemptSummary>>;
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
