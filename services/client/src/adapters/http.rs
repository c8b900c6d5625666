//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, which is the concrete implementation
//! of the `ModelTestService` port from the `core` crate. It talks JSON to the
//! platform's REST backend using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model_test_core::domain::{
    AnswerMap, AttemptId, AttemptStatus, AttemptSummary, AuthContext, Question, QuestionId,
    ResumedAttempt, StartedAttempt, SubmissionReceipt, SubmitPayload, TestDefinition, TestId,
};
use model_test_core::ports::{ModelTestService, PortError, PortResult};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ModelTestService` port over HTTP.
#[derive(Clone)]
pub struct HttpModelTestAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModelTestAdapter {
    /// Creates a new `HttpModelTestAdapter` for a backend at `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the adapter with the configured request timeout.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(client, config.api_base_url.clone()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/model-test{}", self.base_url, path)
    }

    /// Sends the request and returns the body of a successful response.
    async fn send(&self, request: RequestBuilder, what: &str) -> PortResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("{} request failed: {}", what, e)))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(map_status(status, what, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> PortResult<T> {
        let body = self.send(request, what).await?;
        parse_body(&body, what)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str, what: &str) -> PortResult<T> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|e| PortError::Unexpected(format!("{} returned an unreadable body: {}", what, e)))
}

/// Maps a non-success response to the port error taxonomy.
fn map_status(status: StatusCode, what: &str, body: &str) -> PortError {
    let message = error_message(body).unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(format!("{}: {}", what, message)),
        StatusCode::CONFLICT => PortError::Conflict(message),
        _ => PortError::Unexpected(format!("{} failed with {}: {}", what, status, message)),
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))?
        .as_str()
        .map(str::to_string)
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

/// The backend answers either with the bare payload or wrapped as `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRecord {
    #[serde(alias = "_id")]
    id: String,
    #[serde(alias = "text")]
    question: String,
    #[serde(default)]
    options: Vec<String>,
}
impl QuestionRecord {
    fn to_domain(self) -> Question {
        Question {
            id: QuestionId::new(self.id),
            text: self.question,
            options: self.options,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestRecord {
    #[serde(alias = "_id")]
    id: String,
    title: String,
    time_limit: u32,
    #[serde(default)]
    passing_score: Option<f64>,
    #[serde(default)]
    questions: Vec<QuestionRecord>,
}
impl TestRecord {
    fn to_domain(self) -> TestDefinition {
        TestDefinition {
            id: TestId::new(self.id),
            title: self.title,
            time_limit_minutes: self.time_limit,
            passing_score: self.passing_score,
            questions: self.questions.into_iter().map(QuestionRecord::to_domain).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRecord {
    attempt_id: String,
    time_limit: u32,
}
impl StartRecord {
    fn to_domain(self) -> StartedAttempt {
        StartedAttempt {
            attempt_id: AttemptId::new(self.attempt_id),
            time_limit_minutes: self.time_limit,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeRecord {
    #[serde(default)]
    attempt_id: Option<String>,
    start_time: DateTime<Utc>,
    #[serde(default)]
    saved_answers: BTreeMap<String, usize>,
    time_limit: u32,
}
impl ResumeRecord {
    fn to_domain(self, requested: &AttemptId) -> ResumedAttempt {
        ResumedAttempt {
            attempt_id: self
                .attempt_id
                .map(AttemptId::new)
                .unwrap_or_else(|| requested.clone()),
            start_time: self.start_time,
            saved_answers: self
                .saved_answers
                .into_iter()
                .map(|(question, choice)| (QuestionId::new(question), choice))
                .collect::<AnswerMap>(),
            time_limit_minutes: self.time_limit,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptRecord {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}
impl ReceiptRecord {
    fn to_domain(self) -> SubmissionReceipt {
        SubmissionReceipt {
            score: self.score,
            passed: self.passed,
            message: self.message,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    #[serde(alias = "_id", alias = "attemptId")]
    id: String,
    test_id: String,
    #[serde(default)]
    test_title: Option<String>,
    status: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    time_spent: Option<u64>,
    #[serde(default)]
    auto_submitted: bool,
}
impl HistoryRecord {
    fn to_domain(self) -> PortResult<AttemptSummary> {
        let status = parse_status(&self.status)?;
        Ok(AttemptSummary {
            attempt_id: AttemptId::new(self.id),
            test_id: TestId::new(self.test_id),
            test_title: self.test_title,
            status,
            score: self.score,
            passed: self.passed,
            started_at: self.start_time,
            submitted_at: self.submitted_at,
            time_spent_seconds: self.time_spent,
            auto_submitted: self.auto_submitted,
        })
    }
}

fn parse_status(raw: &str) -> PortResult<AttemptStatus> {
    match raw.to_ascii_lowercase().replace('_', "-").as_str() {
        "in-progress" => Ok(AttemptStatus::InProgress),
        "submitted" => Ok(AttemptStatus::Submitted),
        "completed" => Ok(AttemptStatus::Completed),
        other => Err(PortError::Unexpected(format!(
            "unknown attempt status '{}'",
            other
        ))),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerBody<'a> {
    question_id: &'a str,
    answer: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    answers: BTreeMap<&'a str, usize>,
    time_spent: u64,
    auto_submit: bool,
}

//=========================================================================================
// `ModelTestService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModelTestService for HttpModelTestAdapter {
    async fn get_test(&self, auth: &AuthContext, test_id: &TestId) -> PortResult<TestDefinition> {
        let request = self
            .client
            .get(self.url(&format!("/{}", test_id)))
            .bearer_auth(auth.token());
        let record: TestRecord = self.send_json(request, "Fetching the test").await?;
        Ok(record.to_domain())
    }

    /// The backend has no dedicated lookup, so the history is searched instead.
    async fn find_in_progress_attempt(
        &self,
        auth: &AuthContext,
        test_id: &TestId,
    ) -> PortResult<Option<AttemptId>> {
        let history = self.list_history(auth).await?;
        let open = history
            .into_iter()
            .filter(|a| &a.test_id == test_id && a.status == AttemptStatus::InProgress)
            .max_by_key(|a| a.started_at)
            .map(|a| a.attempt_id);
        debug!("Open attempt lookup for test {}: {:?}", test_id, open);
        Ok(open)
    }

    async fn start_attempt(
        &self,
        auth: &AuthContext,
        test_id: &TestId,
    ) -> PortResult<StartedAttempt> {
        let request = self
            .client
            .post(self.url(&format!("/{}/start", test_id)))
            .bearer_auth(auth.token());
        let record: StartRecord = self.send_json(request, "Starting the test").await?;
        Ok(record.to_domain())
    }

    async fn resume_attempt(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
    ) -> PortResult<ResumedAttempt> {
        let request = self
            .client
            .get(self.url(&format!("/attempt/{}/resume", attempt_id)))
            .bearer_auth(auth.token());
        let record: ResumeRecord = self.send_json(request, "Resuming the attempt").await?;
        Ok(record.to_domain(attempt_id))
    }

    async fn save_answer(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
        question_id: &QuestionId,
        choice: usize,
    ) -> PortResult<()> {
        let request = self
            .client
            .post(self.url(&format!("/attempt/{}/answer", attempt_id)))
            .bearer_auth(auth.token())
            .json(&AnswerBody {
                question_id: question_id.as_str(),
                answer: choice,
            });
        self.send(request, "Saving the answer").await?;
        Ok(())
    }

    async fn submit_attempt(
        &self,
        auth: &AuthContext,
        attempt_id: &AttemptId,
        payload: &SubmitPayload,
    ) -> PortResult<SubmissionReceipt> {
        let body = SubmitBody {
            answers: payload
                .answers
                .iter()
                .map(|(question, choice)| (question.as_str(), *choice))
                .collect(),
            time_spent: payload.time_spent_seconds,
            auto_submit: payload.auto_submit,
        };
        let request = self
            .client
            .post(self.url(&format!("/attempt/{}/submit", attempt_id)))
            .bearer_auth(auth.token())
            .header("Idempotency-Key", payload.idempotency_key.to_string())
            .json(&body);
        let what = "Submitting the attempt";
        let body = self.send(request, what).await?;
        if body.trim().is_empty() {
            return Ok(SubmissionReceipt::default());
        }
        let record: ReceiptRecord = parse_body(&body, what)?;
        Ok(record.to_domain())
    }

    async fn list_history(&self, auth: &AuthContext) -> PortResult<Vec<AttemptSummary>> {
        let request = self
            .client
            .get(self.url("/history"))
            .bearer_auth(auth.token());
        let records: Vec<HistoryRecord> = self.send_json(request, "Loading the history").await?;

        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            match record.to_domain() {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("Skipping history entry: {}", e),
            }
        }
        Ok(summaries)
    }
}
