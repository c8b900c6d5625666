//! crates/model_test_core/src/submission.rs
//!
//! The submit gate: `InProgress -> Submitting -> Terminal`. Manual submit and
//! timer expiry both have to pass through `begin`, so only one submission is
//! ever in flight for an attempt.

use uuid::Uuid;

use crate::domain::SubmissionReceipt;
use crate::ports::PortError;
use crate::timer::total_seconds;

/// Why an attempt is no longer open.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalReason {
    Submitted(SubmissionReceipt),
    /// The server reported the attempt as already closed.
    AlreadyClosed,
    /// Time ran out and the final submit failed. The user is let go anyway.
    AutoSubmitFailed(String),
    /// The session was rejected. The attempt stays open on the server and can
    /// be resumed after logging in again.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptPhase {
    InProgress,
    Submitting { auto_submit: bool },
    Terminal(TerminalReason),
}

impl AttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptPhase::Terminal(_))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GateError {
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("the attempt is already closed")]
    AlreadyClosed,
}

/// Issued by `begin`; carries what the submit request needs from the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    pub auto_submit: bool,
    pub idempotency_key: Uuid,
}

/// What the caller should do after a failed submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureFollowUp {
    /// Back to `InProgress`; the user may try again.
    Retry,
    /// The deadline passed while the manual submit was in flight.
    AutoSubmitNow,
    /// The attempt is closed.
    Closed,
    /// The token was rejected; nothing more is sent until the user logs in.
    LoginRequired,
}

#[derive(Debug)]
pub struct SubmissionGate {
    phase: AttemptPhase,
    expired: bool,
    idempotency_key: Uuid,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self {
            phase: AttemptPhase::InProgress,
            expired: false,
            idempotency_key: Uuid::new_v4(),
        }
    }

    pub fn phase(&self) -> &AttemptPhase {
        &self.phase
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// New answers are only taken while the attempt is open and time is left.
    pub fn accepts_answers(&self) -> bool {
        self.phase == AttemptPhase::InProgress && !self.expired
    }

    pub fn mark_expired(&mut self) {
        self.expired = true;
    }

    pub fn begin(&mut self, auto_submit: bool) -> Result<SubmitTicket, GateError> {
        match self.phase {
            AttemptPhase::InProgress => {
                self.phase = AttemptPhase::Submitting { auto_submit };
                Ok(SubmitTicket {
                    auto_submit,
                    idempotency_key: self.idempotency_key,
                })
            }
            AttemptPhase::Submitting { .. } => Err(GateError::AlreadySubmitting),
            AttemptPhase::Terminal(_) => Err(GateError::AlreadyClosed),
        }
    }

    pub fn succeed(&mut self, receipt: SubmissionReceipt) {
        self.phase = AttemptPhase::Terminal(TerminalReason::Submitted(receipt));
    }

    pub fn fail(&mut self, ticket: SubmitTicket, error: &PortError) -> FailureFollowUp {
        match error {
            PortError::Unauthorized => {
                self.phase = AttemptPhase::Terminal(TerminalReason::Unauthorized);
                return FailureFollowUp::LoginRequired;
            }
            PortError::Conflict(_) => {
                self.phase = AttemptPhase::Terminal(TerminalReason::AlreadyClosed);
                return FailureFollowUp::Closed;
            }
            _ => {}
        }
        if ticket.auto_submit {
            self.phase =
                AttemptPhase::Terminal(TerminalReason::AutoSubmitFailed(error.to_string()));
            return FailureFollowUp::Closed;
        }
        self.phase = AttemptPhase::InProgress;
        if self.expired {
            FailureFollowUp::AutoSubmitNow
        } else {
            FailureFollowUp::Retry
        }
    }
}

/// Seconds reported as spent: the full duration for an auto submit, the
/// consumed part of it otherwise.
pub fn time_spent(time_limit_minutes: u32, remaining: u64, auto_submit: bool) -> u64 {
    let total = total_seconds(time_limit_minutes);
    if auto_submit {
        total
    } else {
        total.saturating_sub(remaining)
    }
}
