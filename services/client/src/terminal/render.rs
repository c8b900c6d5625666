//! services/client/src/terminal/render.rs
//!
//! Plain-text rendering of tests, attempt progress and history.

use model_test_core::{
    AnswerMap, AttemptSnapshot, AttemptStatus, AttemptSummary, SubmissionReceipt, TestDefinition,
};
use std::fmt::Write;

use crate::terminal::command::option_label;

/// `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(seconds: u64) -> String {
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub fn render_test(test: &TestDefinition, answers: &AnswerMap) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} questions, {} minutes)",
        test.title,
        test.questions.len(),
        test.time_limit_minutes
    );
    for (number, question) in test.questions.iter().enumerate() {
        let selected = answers.get(&question.id).copied();
        let _ = writeln!(out, "\n{}. {}", number + 1, question.text);
        for (index, option) in question.options.iter().enumerate() {
            let mark = if selected == Some(index) { "x" } else { " " };
            let _ = writeln!(out, "   [{}] {}) {}", mark, option_label(index), option);
        }
    }
    out
}

pub fn render_status(snapshot: &AttemptSnapshot, question_count: usize) -> String {
    let mut line = format!(
        "Time left {} | answered {}/{}",
        format_clock(snapshot.remaining),
        snapshot.answers.len(),
        question_count
    );
    if !snapshot.local_only.is_empty() {
        let _ = write!(
            line,
            " | {} saved locally only",
            snapshot.local_only.len()
        );
    }
    line
}

pub fn render_receipt(receipt: &SubmissionReceipt, auto_submit: bool) -> String {
    let mut out = if auto_submit {
        String::from("Time is up. Your answers were submitted automatically.")
    } else {
        String::from("Your answers were submitted.")
    };
    if let Some(score) = receipt.score {
        let _ = write!(out, " Score: {}", score);
    }
    match receipt.passed {
        Some(true) => out.push_str(" (passed)"),
        Some(false) => out.push_str(" (not passed)"),
        None => {}
    }
    if let Some(message) = &receipt.message {
        let _ = write!(out, "\n{}", message);
    }
    out
}

/// History table, newest attempt first.
pub fn render_history(attempts: &[AttemptSummary]) -> String {
    if attempts.is_empty() {
        return "No attempts yet.".to_string();
    }
    let mut rows: Vec<&AttemptSummary> = attempts.iter().collect();
    rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let mut out = format!(
        "{:<20} {:<28} {:<12} {:>7} {:>9}\n",
        "STARTED", "TEST", "STATUS", "SCORE", "TIME"
    );
    for attempt in rows {
        let started = attempt
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let title = attempt
            .test_title
            .clone()
            .unwrap_or_else(|| attempt.test_id.to_string());
        let status = match (attempt.status, attempt.auto_submitted) {
            (AttemptStatus::InProgress, _) => "in progress".to_string(),
            (status, true) => format!("{} (auto)", status.as_str()),
            (status, false) => status.as_str().to_string(),
        };
        let score = attempt
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let time = attempt
            .time_spent_seconds
            .map(format_clock)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<20} {:<28} {:<12} {:>7} {:>9}",
            started,
            truncate(&title, 28),
            status,
            score,
            time
        );
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
