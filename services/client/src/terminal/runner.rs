//! services/client/src/terminal/runner.rs
//!
//! This is the main control loop of an attempt in the terminal. It interleaves
//! user commands, countdown updates and controller events until the attempt is
//! closed or the user leaves.

use model_test_core::{
    AttemptController, AttemptError, AttemptEvent, AttemptPhase, PortError, SubmissionReceipt,
    TerminalReason,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::terminal::command::{parse_command, Command, CommandError, HELP};
use crate::terminal::render::{format_clock, render_receipt, render_status, render_test};

/// Remaining-time marks at which the user is warned once.
const WARN_AT_SECONDS: [u64; 2] = [300, 60];

/// How an attempt session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptExit {
    Submitted {
        receipt: SubmissionReceipt,
        auto_submit: bool,
    },
    Closed(TerminalReason),
    /// The user left; the attempt stays open and can be resumed.
    Left,
}

pub async fn run_attempt<R, W>(
    controller: Arc<AttemptController>,
    mut events: mpsc::UnboundedReceiver<AttemptEvent>,
    input: R,
    out: &mut W,
) -> Result<AttemptExit, ClientError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut remaining = controller.remaining();
    let mut timer_running = true;
    let mut awaiting_confirmation = false;
    let mut warned: Vec<u64> = Vec::new();

    let question_count = controller.test().questions.len();
    let snapshot = controller.snapshot().await;
    writeln!(out, "{}", render_test(controller.test(), &snapshot.answers))?;
    writeln!(out, "{}", render_status(&snapshot, question_count))?;
    writeln!(out, "Type 'help' for commands.")?;
    out.flush()?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(AttemptExit::Left);
                };
                if let Some(exit) = handle_event(event, out)? {
                    return Ok(exit);
                }
            }
            changed = remaining.changed(), if timer_running => {
                if changed.is_err() {
                    timer_running = false;
                    continue;
                }
                let seconds = *remaining.borrow();
                if crosses_warning_mark(seconds, &mut warned) {
                    writeln!(out, "Warning: {} left.", format_clock(seconds))?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.abandon();
                    writeln!(out, "Input closed. Your attempt stays open and can be resumed.")?;
                    return Ok(AttemptExit::Left);
                };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(CommandError::Empty) => continue,
                    Err(e) => {
                        writeln!(out, "{}", e)?;
                        continue;
                    }
                };
                if let Some(exit) =
                    handle_command(&controller, command, &mut awaiting_confirmation, out).await?
                {
                    return Ok(exit);
                }
            }
        }
        out.flush()?;
    }
}

/// Marks every warning threshold `seconds` has reached. Returns whether a new
/// one was reached, so a resume below several marks warns once.
fn crosses_warning_mark(seconds: u64, warned: &mut Vec<u64>) -> bool {
    if seconds == 0 {
        return false;
    }
    let mut crossed = false;
    for mark in WARN_AT_SECONDS {
        if seconds <= mark && !warned.contains(&mark) {
            warned.push(mark);
            crossed = true;
        }
    }
    crossed
}

fn handle_event<W: Write>(
    event: AttemptEvent,
    out: &mut W,
) -> Result<Option<AttemptExit>, ClientError> {
    match event {
        AttemptEvent::AnswerSynced { question_id } => {
            debug!("Answer for {} saved.", question_id);
        }
        AttemptEvent::AnswerLocalOnly { question_id, reason } => {
            info!("Answer for {} not saved: {}", question_id, reason);
            writeln!(
                out,
                "Could not save the answer for question {} ({}). It is kept locally and will be included when you submit.",
                question_id, reason
            )?;
        }
        AttemptEvent::Expired => {
            writeln!(out, "Time is up. Submitting your answers...")?;
        }
        AttemptEvent::SubmitFailed { message, auto_submit } => {
            if auto_submit {
                writeln!(out, "Automatic submission failed: {}", message)?;
            } else {
                writeln!(out, "Submission failed: {}", message)?;
            }
        }
        AttemptEvent::Submitted {
            receipt,
            auto_submit,
        } => {
            writeln!(out, "{}", render_receipt(&receipt, auto_submit))?;
            return Ok(Some(AttemptExit::Submitted {
                receipt,
                auto_submit,
            }));
        }
        AttemptEvent::Closed(TerminalReason::Unauthorized) => {
            writeln!(out, "{}", describe_closed(&TerminalReason::Unauthorized))?;
            return Err(PortError::Unauthorized.into());
        }
        AttemptEvent::Closed(reason) => {
            writeln!(out, "{}", describe_closed(&reason))?;
            return Ok(Some(AttemptExit::Closed(reason)));
        }
    }
    Ok(None)
}

async fn handle_command<W: Write>(
    controller: &Arc<AttemptController>,
    command: Command,
    awaiting_confirmation: &mut bool,
    out: &mut W,
) -> Result<Option<AttemptExit>, ClientError> {
    if *awaiting_confirmation && !matches!(command, Command::Confirm(_)) {
        *awaiting_confirmation = false;
        writeln!(out, "Submission cancelled.")?;
    }

    match command {
        Command::Show => {
            let snapshot = controller.snapshot().await;
            writeln!(out, "{}", render_test(controller.test(), &snapshot.answers))?;
        }
        Command::Status => {
            let snapshot = controller.snapshot().await;
            writeln!(
                out,
                "{}",
                render_status(&snapshot, controller.test().questions.len())
            )?;
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Answer { question, choice } => {
            let Some(target) = controller.test().questions.get(question) else {
                writeln!(out, "There is no question {}.", question + 1)?;
                return Ok(None);
            };
            let question_id = target.id.clone();
            match controller.record_answer(&question_id, choice).await {
                Ok(_sync) => writeln!(
                    out,
                    "Question {}: option {} selected.",
                    question + 1,
                    choice + 1
                )?,
                Err(e) => writeln!(out, "{}", e)?,
            }
        }
        Command::Submit => {
            let snapshot = controller.snapshot().await;
            let unanswered = controller
                .test()
                .questions
                .len()
                .saturating_sub(snapshot.answers.len());
            if unanswered > 0 {
                writeln!(out, "{} question(s) are unanswered.", unanswered)?;
            }
            writeln!(out, "Submit now? (y/n)")?;
            *awaiting_confirmation = true;
        }
        Command::Confirm(false) => {
            if *awaiting_confirmation {
                *awaiting_confirmation = false;
                writeln!(out, "Submission cancelled.")?;
            }
        }
        Command::Confirm(true) => {
            if !*awaiting_confirmation {
                writeln!(out, "Nothing to confirm.")?;
                return Ok(None);
            }
            *awaiting_confirmation = false;
            return submit(controller, out).await;
        }
        Command::Leave => {
            controller.abandon();
            writeln!(
                out,
                "Left attempt {}. It stays open and can be resumed.",
                controller.attempt_id()
            )?;
            return Ok(Some(AttemptExit::Left));
        }
    }
    Ok(None)
}

async fn submit<W: Write>(
    controller: &Arc<AttemptController>,
    out: &mut W,
) -> Result<Option<AttemptExit>, ClientError> {
    writeln!(out, "Submitting...")?;
    match controller.submit().await {
        Ok(outcome) => {
            writeln!(out, "{}", render_receipt(&outcome.receipt, outcome.auto_submit))?;
            Ok(Some(AttemptExit::Submitted {
                receipt: outcome.receipt,
                auto_submit: outcome.auto_submit,
            }))
        }
        Err(e) => {
            if let AttemptPhase::Terminal(reason) = controller.snapshot().await.phase {
                let exit = match reason {
                    TerminalReason::Unauthorized => {
                        writeln!(out, "{}", describe_closed(&TerminalReason::Unauthorized))?;
                        return Err(PortError::Unauthorized.into());
                    }
                    TerminalReason::Submitted(receipt) => AttemptExit::Submitted {
                        receipt,
                        auto_submit: true,
                    },
                    other => {
                        writeln!(out, "{}", describe_closed(&other))?;
                        AttemptExit::Closed(other)
                    }
                };
                return Ok(Some(exit));
            }
            match e {
                AttemptError::Submit(_) => {
                    writeln!(out, "{}. Type 'submit' to try again.", e)?;
                }
                other => writeln!(out, "{}", other)?,
            }
            Ok(None)
        }
    }
}

fn describe_closed(reason: &TerminalReason) -> String {
    match reason {
        TerminalReason::Submitted(receipt) => render_receipt(receipt, false),
        TerminalReason::AlreadyClosed => {
            "This attempt was already submitted and is closed.".to_string()
        }
        TerminalReason::Unauthorized => {
            "Your session was rejected. Log in again; the attempt stays open and can be resumed."
                .to_string()
        }
        TerminalReason::AutoSubmitFailed(message) => format!(
            "Time is up but the final submission failed ({}). Your saved answers remain on the server.",
            message
        ),
    }
}
