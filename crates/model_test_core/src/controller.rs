//! crates/model_test_core/src/controller.rs
//!
//! The attempt controller owns one hydrated attempt. It runs the countdown,
//! mirrors answers optimistically while saving them in the background, and
//! routes both manual submit and timer expiry through the submission gate.

use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::answers::AnswerLog;
use crate::domain::{
    AnswerMap, AttemptId, AuthContext, QuestionId, SubmissionReceipt, SubmitPayload,
    TestDefinition,
};
use crate::initializer::HydratedAttempt;
use crate::ports::{ModelTestService, PortError};
use crate::submission::{
    time_spent, AttemptPhase, FailureFollowUp, GateError, SubmissionGate, TerminalReason,
};
use crate::timer::{run_countdown, Countdown, CountdownOutcome};

/// Errors returned to the front end by controller operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttemptError {
    #[error("Unknown question: {0}")]
    UnknownQuestion(QuestionId),
    #[error("Question {question} has no option {choice}")]
    InvalidChoice { question: QuestionId, choice: usize },
    #[error("The attempt no longer accepts answers")]
    NotAcceptingAnswers,
    #[error("Submission rejected: {0}")]
    Gate(#[from] GateError),
    #[error("Submission failed: {0}")]
    Submit(PortError),
    #[error("The attempt was closed without a receipt")]
    ClosedWithoutReceipt,
}

/// Notifications for the front end. Ticks are published separately through
/// the `remaining()` watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    AnswerSynced { question_id: QuestionId },
    /// The save call failed; the answer stays selected and goes out with the final submit.
    AnswerLocalOnly { question_id: QuestionId, reason: String },
    Expired,
    Submitted { receipt: SubmissionReceipt, auto_submit: bool },
    SubmitFailed { message: String, auto_submit: bool },
    Closed(TerminalReason),
}

/// A successful submit. `auto_submit` is set when the submission that went
/// through was the automatic one, e.g. after a manual submit failed past the
/// deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub receipt: SubmissionReceipt,
    pub auto_submit: bool,
}

/// A read-only view of the attempt for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSnapshot {
    pub attempt_id: AttemptId,
    pub remaining: u64,
    pub answers: AnswerMap,
    pub local_only: Vec<QuestionId>,
    pub phase: AttemptPhase,
    pub expired: bool,
}

pub struct AttemptController {
    api: Arc<dyn ModelTestService>,
    auth: AuthContext,
    test: TestDefinition,
    attempt_id: AttemptId,
    time_limit_minutes: u32,
    answers: Mutex<AnswerLog>,
    gate: Mutex<SubmissionGate>,
    remaining: watch::Receiver<u64>,
    events: mpsc::UnboundedSender<AttemptEvent>,
    cancel: CancellationToken,
}

impl AttemptController {
    /// Takes over a hydrated attempt and starts its countdown.
    pub fn launch(
        api: Arc<dyn ModelTestService>,
        auth: AuthContext,
        hydrated: HydratedAttempt,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AttemptEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (remaining_tx, remaining_rx) = watch::channel(hydrated.time_remaining);
        let cancel = CancellationToken::new();

        let controller = Arc::new(Self {
            api,
            auth,
            test: hydrated.test,
            attempt_id: hydrated.attempt_id,
            time_limit_minutes: hydrated.time_limit_minutes,
            answers: Mutex::new(AnswerLog::from_snapshot(hydrated.answers)),
            gate: Mutex::new(SubmissionGate::new()),
            remaining: remaining_rx,
            events: events_tx,
            cancel: cancel.clone(),
        });

        // The timer only holds a weak reference, so dropping the controller ends it.
        let weak: Weak<Self> = Arc::downgrade(&controller);
        let countdown = Countdown::new(hydrated.time_remaining);
        tokio::spawn(async move {
            if run_countdown(countdown, remaining_tx, cancel).await == CountdownOutcome::Expired {
                if let Some(controller) = weak.upgrade() {
                    controller.expire().await;
                }
            }
        });

        info!(
            "Attempt {} launched with {}s remaining.",
            controller.attempt_id, hydrated.time_remaining
        );
        (controller, events_rx)
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt_id
    }

    pub fn test(&self) -> &TestDefinition {
        &self.test
    }

    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Seconds left, updated once per tick.
    pub fn remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub async fn snapshot(&self) -> AttemptSnapshot {
        let (answers, local_only) = {
            let log = self.answers.lock().await;
            (log.current(), log.local_only())
        };
        let gate = self.gate.lock().await;
        AttemptSnapshot {
            attempt_id: self.attempt_id.clone(),
            remaining: *self.remaining.borrow(),
            answers,
            local_only,
            phase: gate.phase().clone(),
            expired: gate.is_expired(),
        }
    }

    /// Selects `choice` for `question_id` right away and saves it in the
    /// background. The returned handle resolves once the save has settled.
    pub async fn record_answer(
        self: &Arc<Self>,
        question_id: &QuestionId,
        choice: usize,
    ) -> Result<JoinHandle<()>, AttemptError> {
        let question = self
            .test
            .question(question_id)
            .ok_or_else(|| AttemptError::UnknownQuestion(question_id.clone()))?;
        if !question.accepts_choice(choice) {
            return Err(AttemptError::InvalidChoice {
                question: question_id.clone(),
                choice,
            });
        }

        let seq = {
            let gate = self.gate.lock().await;
            if !gate.accepts_answers() {
                return Err(AttemptError::NotAcceptingAnswers);
            }
            self.answers.lock().await.record(question_id.clone(), choice)
        };

        let this = Arc::clone(self);
        let question_id = question_id.clone();
        Ok(tokio::spawn(async move {
            this.sync_answer(seq, question_id, choice).await;
        }))
    }

    async fn sync_answer(&self, seq: u64, question_id: QuestionId, choice: usize) {
        let result = self
            .api
            .save_answer(&self.auth, &self.attempt_id, &question_id, choice)
            .await;

        match result {
            Ok(()) => {
                self.answers.lock().await.mark_synced(seq);
                let _ = self.events.send(AttemptEvent::AnswerSynced { question_id });
            }
            Err(e) => {
                warn!(
                    "Answer for question {} kept locally only: {}",
                    question_id, e
                );
                self.answers.lock().await.mark_local_only(seq);
                let _ = self.events.send(AttemptEvent::AnswerLocalOnly {
                    question_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Manual submit, after the user confirmed.
    pub async fn submit(&self) -> Result<SubmitOutcome, AttemptError> {
        self.finalize(false).await
    }

    /// Leaves the attempt without submitting. It stays open on the server and
    /// can be resumed later.
    pub fn abandon(&self) {
        info!("Leaving attempt {} without submitting.", self.attempt_id);
        self.cancel.cancel();
    }

    async fn expire(&self) {
        self.gate.lock().await.mark_expired();
        let _ = self.events.send(AttemptEvent::Expired);
        match self.finalize(true).await {
            Ok(_) => {}
            // A manual submit in flight owns the outcome; it hands back to us if it fails.
            Err(AttemptError::Gate(GateError::AlreadySubmitting)) => {
                info!("Time ran out while a manual submit was in flight.");
            }
            Err(AttemptError::Gate(GateError::AlreadyClosed)) => {}
            Err(e) => error!("Auto-submit of attempt {} failed: {}", self.attempt_id, e),
        }
    }

    async fn finalize(&self, mut auto_submit: bool) -> Result<SubmitOutcome, AttemptError> {
        loop {
            let ticket = self.gate.lock().await.begin(auto_submit)?;
            let answers = self.answers.lock().await.current();
            let remaining = *self.remaining.borrow();
            let payload = SubmitPayload {
                time_spent_seconds: time_spent(self.time_limit_minutes, remaining, auto_submit),
                answers,
                auto_submit,
                idempotency_key: ticket.idempotency_key,
            };
            info!(
                "Submitting attempt {} ({} answers, {}s spent, auto_submit={}).",
                self.attempt_id,
                payload.answers.len(),
                payload.time_spent_seconds,
                auto_submit
            );

            let result = self
                .api
                .submit_attempt(&self.auth, &self.attempt_id, &payload)
                .await;

            let mut gate = self.gate.lock().await;
            match result {
                Ok(receipt) => {
                    gate.succeed(receipt.clone());
                    self.cancel.cancel();
                    let _ = self.events.send(AttemptEvent::Submitted {
                        receipt: receipt.clone(),
                        auto_submit,
                    });
                    return Ok(SubmitOutcome {
                        receipt,
                        auto_submit,
                    });
                }
                Err(e) => {
                    error!("Submit of attempt {} failed: {}", self.attempt_id, e);
                    let follow_up = gate.fail(ticket, &e);
                    let _ = self.events.send(AttemptEvent::SubmitFailed {
                        message: e.to_string(),
                        auto_submit,
                    });
                    match follow_up {
                        FailureFollowUp::Retry => return Err(AttemptError::Submit(e)),
                        FailureFollowUp::AutoSubmitNow => {
                            auto_submit = true;
                        }
                        FailureFollowUp::Closed | FailureFollowUp::LoginRequired => {
                            self.cancel.cancel();
                            if let AttemptPhase::Terminal(reason) = gate.phase() {
                                let _ = self.events.send(AttemptEvent::Closed(reason.clone()));
                            }
                            return Err(match e {
                                PortError::Conflict(_) => AttemptError::ClosedWithoutReceipt,
                                other => AttemptError::Submit(other),
                            });
                        }
                    }
                }
            }
        }
    }
}

impl Drop for AttemptController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
