//! crates/model_test_core/src/initializer.rs
//!
//! Decides whether an attempt is resumed or started, and hydrates the local
//! mirror (answers and remaining time) from whichever the server returns.

use tracing::{info, warn};

use crate::domain::{AnswerMap, AttemptId, AuthContext, TestDefinition, TestId};
use crate::ports::{Clock, ModelTestService, PortError, PortResult};
use crate::timer::{remaining_seconds, total_seconds};

/// Everything the controller needs to take over an attempt.
#[derive(Debug, Clone)]
pub struct HydratedAttempt {
    pub test: TestDefinition,
    pub attempt_id: AttemptId,
    pub time_limit_minutes: u32,
    pub answers: AnswerMap,
    pub time_remaining: u64,
    pub resumed: bool,
}

/// Loads the test and attaches to an attempt.
///
/// * An explicit `resume` id is tried first.
/// * Without one, an in-progress attempt of the same test is looked up so a
///   second attempt is never created next to an open one.
/// * Any resume failure other than `Unauthorized` falls back to starting fresh.
pub async fn initialize_attempt(
    api: &dyn ModelTestService,
    clock: &dyn Clock,
    auth: &AuthContext,
    test_id: &TestId,
    resume: Option<&AttemptId>,
) -> PortResult<HydratedAttempt> {
    let test = api.get_test(auth, test_id).await?;

    let candidate = match resume {
        Some(attempt_id) => Some(attempt_id.clone()),
        None => match api.find_in_progress_attempt(auth, test_id).await {
            Ok(found) => found,
            Err(PortError::Unauthorized) => return Err(PortError::Unauthorized),
            Err(e) => {
                warn!("Could not look up open attempts for test {}: {}", test_id, e);
                None
            }
        },
    };

    if let Some(attempt_id) = candidate {
        match api.resume_attempt(auth, &attempt_id).await {
            Ok(resumed) => {
                let time_remaining = remaining_seconds(
                    resumed.time_limit_minutes,
                    resumed.start_time,
                    clock.now(),
                );
                info!(
                    "Resumed attempt {} with {} saved answers and {}s left.",
                    resumed.attempt_id,
                    resumed.saved_answers.len(),
                    time_remaining
                );
                return Ok(HydratedAttempt {
                    test,
                    attempt_id: resumed.attempt_id,
                    time_limit_minutes: resumed.time_limit_minutes,
                    answers: resumed.saved_answers,
                    time_remaining,
                    resumed: true,
                });
            }
            Err(PortError::Unauthorized) => return Err(PortError::Unauthorized),
            Err(e) => {
                warn!(
                    "Failed to resume attempt {}: {}. Starting a new attempt instead.",
                    attempt_id, e
                );
            }
        }
    }

    let started = api.start_attempt(auth, test_id).await?;
    info!(
        "Started attempt {} for test {} ({} minutes).",
        started.attempt_id, test_id, started.time_limit_minutes
    );
    Ok(HydratedAttempt {
        test,
        attempt_id: started.attempt_id,
        time_limit_minutes: started.time_limit_minutes,
        answers: AnswerMap::new(),
        time_remaining: total_seconds(started.time_limit_minutes),
        resumed: false,
    })
}
