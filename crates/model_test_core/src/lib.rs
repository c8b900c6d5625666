pub mod answers;
pub mod controller;
pub mod domain;
pub mod initializer;
pub mod ports;
pub mod submission;
pub mod timer;

#[cfg(test)]
mod fake;

pub use answers::{AnswerLog, SyncStatus};
pub use controller::{AttemptController, AttemptError, AttemptEvent, AttemptSnapshot, SubmitOutcome};
pub use domain::{
    AnswerMap, AttemptId, AttemptStatus, AttemptSummary, AuthContext, Question, QuestionId,
    ResumedAttempt, StartedAttempt, SubmissionReceipt, SubmitPayload, TestDefinition, TestId,
};
pub use initializer::{initialize_attempt, HydratedAttempt};
pub use ports::{Clock, ModelTestService, PortError, PortResult};
pub use submission::{AttemptPhase, TerminalReason};
