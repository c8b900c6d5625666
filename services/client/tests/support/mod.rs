// tests/support/mod.rs
//
// An in-process stand-in for the model test backend, served with axum on a
// random local port.

#![allow(dead_code)]


use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use client_lib::{adapters::HttpModelTestAdapter, session::TokenStore};
use model_test_core::{AuthContext, ModelTestService};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

pub const TOKEN: &str = "student-token";
pub const TEST_ID: &str = "algebra-1";
pub const TIME_LIMIT_MINUTES: u32 = 30;
pub const QUESTION_COUNT: usize = 5;

pub struct MockAttempt {
    pub test_id: String,
    pub start_time: DateTime<Utc>,
    pub answers: BTreeMap<String, usize>,
    pub status: &'static str,
    pub receipt: Option<(Option<String>, Value)>,
}

pub struct SubmitRecord {
    pub attempt_id: String,
    pub idempotency_key: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    pub attempts: BTreeMap<String, MockAttempt>,
    pub start_calls: usize,
    pub answer_calls: usize,
    pub submissions: Vec<SubmitRecord>,
    pub fail_answers: bool,
    /// Answers every submit with 401, as for a token that expired mid-attempt.
    pub reject_submit: bool,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Moves the start of an attempt `secs` into the past.
    pub fn backdate(&self, attempt_id: &str, secs: i64) {
        let mut state = self.state();
        let attempt = state.attempts.get_mut(attempt_id).unwrap();
        attempt.start_time = attempt.start_time - Duration::seconds(secs);
    }
}

/// Spawns the backend and returns it with its base URL (e.g. "http://127.0.0.1:12345").
pub async fn spawn_backend() -> (MockBackend, String) {
    let backend = MockBackend::default();

    let routes = Router::new()
        .route("/history", get(history))
        .route("/attempt/{attempt_id}/resume", get(resume))
        .route("/attempt/{attempt_id}/answer", post(save_answer))
        .route("/attempt/{attempt_id}/submit", post(submit))
        .route("/{test_id}", get(get_test))
        .route("/{test_id}/start", post(start));
    let app = Router::new()
        .nest("/api/model-test", routes)
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (backend, address)
}

pub fn adapter(base_url: &str) -> Arc<dyn ModelTestService> {
    Arc::new(HttpModelTestAdapter::new(reqwest::Client::new(), base_url))
}

pub fn auth() -> AuthContext {
    AuthContext::from_token(Some(TOKEN.to_string())).unwrap()
}

/// A token store backed by a fresh file under the temp dir.
pub async fn token_store(name: &str, token: &str) -> (TokenStore, PathBuf) {
    let path = std::env::temp_dir()
        .join(format!("model-test-it-{}-{}", std::process::id(), name))
        .join("token");
    let store = TokenStore::new(path.clone(), None);
    store.save(token).await.unwrap();
    (store, path)
}

//=========================================================================================
// Handlers
//=========================================================================================

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn get_test(headers: HeaderMap, Path(test_id): Path<String>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    if test_id != TEST_ID {
        return error(StatusCode::NOT_FOUND, "Test not found");
    }
    let questions: Vec<Value> = (1..=QUESTION_COUNT)
        .map(|n| {
            json!({
                "_id": format!("q{}", n),
                "question": format!("What is {} + {}?", n, n),
                "options": [format!("{}", n), format!("{}", n * 2), "0", "none"],
            })
        })
        .collect();
    Json(json!({
        "data": {
            "_id": TEST_ID,
            "title": "Algebra basics",
            "timeLimit": TIME_LIMIT_MINUTES,
            "passingScore": 3,
            "questions": questions,
        }
    }))
    .into_response()
}

async fn start(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(test_id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let mut state = backend.state();
    state.start_calls += 1;
    let attempt_id = format!("attempt-{}", state.start_calls);
    state.attempts.insert(
        attempt_id.clone(),
        MockAttempt {
            test_id,
            start_time: Utc::now(),
            answers: BTreeMap::new(),
            status: "in-progress",
            receipt: None,
        },
    );
    Json(json!({ "attemptId": attempt_id, "timeLimit": TIME_LIMIT_MINUTES })).into_response()
}

async fn history(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let state = backend.state();
    let rows: Vec<Value> = state
        .attempts
        .iter()
        .map(|(id, attempt)| {
            let receipt = attempt.receipt.as_ref().map(|(_, r)| r.clone());
            json!({
                "_id": id,
                "testId": attempt.test_id,
                "testTitle": "Algebra basics",
                "status": attempt.status,
                "startTime": attempt.start_time,
                "score": receipt.as_ref().and_then(|r| r.get("score").cloned()),
            })
        })
        .collect();
    Json(rows).into_response()
}

async fn resume(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(attempt_id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let state = backend.state();
    match state.attempts.get(&attempt_id) {
        None => error(StatusCode::NOT_FOUND, "Attempt not found"),
        Some(attempt) if attempt.status != "in-progress" => {
            error(StatusCode::BAD_REQUEST, "Attempt is already submitted")
        }
        Some(attempt) => Json(json!({
            "attemptId": attempt_id,
            "startTime": attempt.start_time,
            "savedAnswers": attempt.answers,
            "timeLimit": TIME_LIMIT_MINUTES,
        }))
        .into_response(),
    }
}

async fn save_answer(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(attempt_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let mut state = backend.state();
    state.answer_calls += 1;
    if state.fail_answers {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let (Some(question_id), Some(answer)) = (body["questionId"].as_str(), body["answer"].as_u64())
    else {
        return error(StatusCode::BAD_REQUEST, "questionId and answer are required");
    };
    match state.attempts.get_mut(&attempt_id) {
        Some(attempt) if attempt.status == "in-progress" => {
            attempt.answers.insert(question_id.to_string(), answer as usize);
            StatusCode::NO_CONTENT.into_response()
        }
        Some(_) => error(StatusCode::CONFLICT, "Attempt is closed"),
        None => error(StatusCode::NOT_FOUND, "Attempt not found"),
    }
}

async fn submit(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(attempt_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) || backend.state().reject_submit {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut state = backend.state();
    state.submissions.push(SubmitRecord {
        attempt_id: attempt_id.clone(),
        idempotency_key: idempotency_key.clone(),
        body: body.clone(),
    });

    let Some(attempt) = state.attempts.get_mut(&attempt_id) else {
        return error(StatusCode::NOT_FOUND, "Attempt not found");
    };
    if let Some((key, receipt)) = &attempt.receipt {
        if key.is_some() && *key == idempotency_key {
            return Json(receipt.clone()).into_response();
        }
        return error(StatusCode::CONFLICT, "Attempt already submitted");
    }

    let score = body["answers"].as_object().map(|a| a.len()).unwrap_or(0);
    let receipt = json!({
        "score": score,
        "passed": score >= 3,
        "message": "Test submitted",
    });
    attempt.status = "completed";
    attempt.receipt = Some((idempotency_key, receipt.clone()));
    Json(receipt).into_response()
}
