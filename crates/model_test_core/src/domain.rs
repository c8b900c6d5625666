//! crates/model_test_core/src/domain.rs
//!
//! Defines the pure, core data structures for the model test client.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::ports::PortError;

//=========================================================================================
// Identifiers
//=========================================================================================

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Server-assigned identifier of a test definition.
    TestId
);
opaque_id!(
    /// Server-assigned identifier of one attempt at a test.
    AttemptId
);
opaque_id!(
    /// Identifier of a question within a test.
    QuestionId
);

/// Selected answers keyed by question. At most one choice per question.
pub type AnswerMap = BTreeMap<QuestionId, usize>;

//=========================================================================================
// Auth Session
//=========================================================================================

/// An explicit bearer-token session, passed into every port call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    token: String,
}

impl AuthContext {
    /// Builds a session from a stored token. A missing or blank token means
    /// the user has to log in first.
    pub fn from_token(token: Option<String>) -> Result<Self, PortError> {
        match token {
            Some(token) if !token.trim().is_empty() => Ok(Self {
                token: token.trim().to_string(),
            }),
            _ => Err(PortError::Unauthorized),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"<redacted>")
            .finish()
    }
}

//=========================================================================================
// Test Definition
//=========================================================================================

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn accepts_choice(&self, choice: usize) -> bool {
        choice < self.options.len()
    }
}

/// The immutable definition of a model test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDefinition {
    pub id: TestId,
    pub title: String,
    pub time_limit_minutes: u32,
    pub passing_score: Option<f64>,
    pub questions: Vec<Question>,
}

impl TestDefinition {
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }
}

//=========================================================================================
// Attempts
//=========================================================================================

/// Lifecycle status of an attempt as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Completed,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in-progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Completed => "completed",
        }
    }
}

/// Returned by the server when a fresh attempt is created.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedAttempt {
    pub attempt_id: AttemptId,
    pub time_limit_minutes: u32,
}

/// Returned by the server when an existing attempt is resumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumedAttempt {
    pub attempt_id: AttemptId,
    pub start_time: DateTime<Utc>,
    pub saved_answers: AnswerMap,
    pub time_limit_minutes: u32,
}

/// The body of a final submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitPayload {
    pub answers: AnswerMap,
    pub time_spent_seconds: u64,
    pub auto_submit: bool,
    /// Identical for every submit of the same attempt.
    pub idempotency_key: uuid::Uuid,
}

/// What the server reports once an attempt is submitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmissionReceipt {
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub message: Option<String>,
}

/// One row of the read-only attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub attempt_id: AttemptId,
    pub test_id: TestId,
    pub test_title: Option<String>,
    pub status: AttemptStatus,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<u64>,
    pub auto_submitted: bool,
}
