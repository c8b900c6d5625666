//! In-memory implementations of the ports, used by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::{
    AnswerMap, AttemptId, AttemptStatus, AttemptSummary, AuthContext, Question, QuestionId,
    ResumedAttempt, StartedAttempt, SubmissionReceipt, SubmitPayload, TestDefinition, TestId,
};
use crate::ports::{Clock, ModelTestService, PortError, PortResult};

pub fn epoch_plus(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + ChronoDuration::seconds(secs)
}

#[derive(Clone)]
pub struct FakeClock {
    offset: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn at(secs: i64) -> Self {
        Self {
            offset: Arc::new(AtomicI64::new(secs)),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.offset.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        epoch_plus(self.offset.load(Ordering::SeqCst))
    }
}

pub struct FakeAttempt {
    pub test_id: TestId,
    pub start_time: DateTime<Utc>,
    pub answers: AnswerMap,
    pub status: AttemptStatus,
    pub receipt: Option<(uuid::Uuid, SubmissionReceipt)>,
}

#[derive(Default)]
pub struct FakeState {
    pub attempts: BTreeMap<AttemptId, FakeAttempt>,
    pub start_calls: usize,
    pub save_calls: usize,
    pub submissions: Vec<(AttemptId, SubmitPayload)>,
    pub fail_answers: bool,
    pub fail_resume: bool,
    pub unauthorized: bool,
    pub submit_failures: VecDeque<PortError>,
    pub submit_delay: Option<Duration>,
}

pub struct FakeService {
    test: TestDefinition,
    state: Mutex<FakeState>,
}

impl FakeService {
    pub fn with_test(time_limit_minutes: u32, question_count: usize) -> Self {
        let questions = (1..=question_count)
            .map(|n| Question {
                id: QuestionId::new(format!("q{}", n)),
                text: format!("Question {}", n),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            })
            .collect();
        Self {
            test: TestDefinition {
                id: TestId::from("test-1"),
                title: "Sample model test".to_string(),
                time_limit_minutes,
                passing_score: Some(60.0),
                questions,
            },
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn test_id(&self) -> TestId {
        self.test.id.clone()
    }

    pub fn test(&self) -> TestDefinition {
        self.test.clone()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn seed_attempt(&self, start_offset_secs: i64) -> AttemptId {
        let mut state = self.state();
        let attempt_id = AttemptId::new(format!("attempt-{}", state.attempts.len() + 1));
        state.attempts.insert(
            attempt_id.clone(),
            FakeAttempt {
                test_id: self.test.id.clone(),
                start_time: epoch_plus(start_offset_secs),
                answers: AnswerMap::new(),
                status: AttemptStatus::InProgress,
                receipt: None,
            },
        );
        attempt_id
    }

    pub fn seed_answer(&self, attempt_id: &AttemptId, question: &str, choice: usize) {
        if let Some(attempt) = self.state().attempts.get_mut(attempt_id) {
            attempt.answers.insert(QuestionId::from(question), choice);
        }
    }

    fn check_auth(&self) -> PortResult<()> {
        if self.state().unauthorized {
            Err(PortError::Unauthorized)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ModelTestService for FakeService {
    async fn get_test(&self, _auth: &AuthContext, test_id: &TestId) -> PortResult<TestDefinition> {
        self.check_auth()?;
        if test_id == &self.test.id {
            Ok(self.test.clone())
        } else {
            Err(PortError::NotFound(format!("Test {} not found", test_id)))
        }
    }

    async fn find_in_progress_attempt(
        &self,
        _auth: &AuthContext,
        test_id: &TestId,
    ) -> PortResult<Option<AttemptId>> {
        self.check_auth()?;
        Ok(self
            .state()
            .attempts
            .iter()
            .find(|(_, a)| &a.test_id == test_id && a.status == AttemptStatus::InProgress)
            .map(|(id, _)| id.clone()))
    }

    async fn start_attempt(
        &self,
        _auth: &AuthContext,
        _test_id: &TestId,
    ) -> PortResult<StartedAttempt> {
        self.check_auth()?;
        let attempt_id = self.seed_attempt(0);
        self.state().start_calls += 1;
        Ok(StartedAttempt {
            attempt_id,
            time_limit_minutes: self.test.time_limit_minutes,
        })
    }

    async fn resume_attempt(
        &self,
        _auth: &AuthContext,
        attempt_id: &AttemptId,
    ) -> PortResult<ResumedAttempt> {
        self.check_auth()?;
        let state = self.state();
        if state.fail_resume {
            return Err(PortError::Unexpected("resume unavailable".to_string()));
        }
        let attempt = state
            .attempts
            .get(attempt_id)
            .ok_or_else(|| PortError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        Ok(ResumedAttempt {
            attempt_id: attempt_id.clone(),
            start_time: attempt.start_time,
            saved_answers: attempt.answers.clone(),
            time_limit_minutes: self.test.time_limit_minutes,
        })
    }

    async fn save_answer(
        &self,
        _auth: &AuthContext,
        attempt_id: &AttemptId,
        question_id: &QuestionId,
        choice: usize,
    ) -> PortResult<()> {
        self.check_auth()?;
        let mut state = self.state();
        state.save_calls += 1;
        if state.fail_answers {
            return Err(PortError::Unexpected("answer endpoint returned 500".to_string()));
        }
        let attempt = state
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| PortError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        attempt.answers.insert(question_id.clone(), choice);
        Ok(())
    }

    async fn submit_attempt(
        &self,
        _auth: &AuthContext,
        attempt_id: &AttemptId,
        payload: &SubmitPayload,
    ) -> PortResult<SubmissionReceipt> {
        self.check_auth()?;
        let delay = self.state().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.submissions.push((attempt_id.clone(), payload.clone()));
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }
        let attempt = state
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| PortError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        if let Some((key, receipt)) = &attempt.receipt {
            if *key == payload.idempotency_key {
                return Ok(receipt.clone());
            }
            return Err(PortError::Conflict("attempt already submitted".to_string()));
        }
        let receipt = SubmissionReceipt {
            score: Some(payload.answers.len() as f64),
            passed: Some(payload.answers.len() >= 3),
            message: Some("Test submitted".to_string()),
        };
        attempt.answers = payload.answers.clone();
        attempt.status = AttemptStatus::Completed;
        attempt.receipt = Some((payload.idempotency_key, receipt.clone()));
        Ok(receipt)
    }

    async fn list_history(&self, _auth: &AuthContext) -> PortResult<Vec<AttemptSummary>> {
        self.check_auth()?;
        Ok(self
            .state()
            .attempts
            .iter()
            .map(|(id, a)| AttemptSummary {
                attempt_id: id.clone(),
                test_id: a.test_id.clone(),
                test_title: Some(self.test.title.clone()),
                status: a.status,
                score: a.receipt.as_ref().and_then(|(_, r)| r.score),
                passed: a.receipt.as_ref().and_then(|(_, r)| r.passed),
                started_at: Some(a.start_time),
                submitted_at: None,
                time_spent_seconds: None,
                auto_submitted: false,
            })
            .collect())
    }
}
