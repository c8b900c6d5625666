//! services/client/src/terminal/command.rs
//!
//! Defines the line commands a user can type during an attempt.

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    /// Both numbers are zero-based.
    Answer { question: usize, choice: usize },
    Status,
    Submit,
    Confirm(bool),
    Leave,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("usage: answer <question number> <option letter or number>")]
    AnswerUsage,
    #[error("'{0}' is not a valid option")]
    BadOption(String),
}

pub const HELP: &str = "\
Commands:
  show                      list the questions and your answers
  answer <question> <opt>   select an option, e.g. 'answer 3 b' or 'answer 3 2'
  status                    time left and progress
  submit                    submit the attempt (asks for confirmation)
  leave                     leave without submitting; resume later
  help                      this text";

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(CommandError::Empty);
    };

    match head.to_ascii_lowercase().as_str() {
        "show" | "list" => Ok(Command::Show),
        "status" | "time" => Ok(Command::Status),
        "submit" => Ok(Command::Submit),
        "leave" | "quit" | "exit" => Ok(Command::Leave),
        "help" | "?" => Ok(Command::Help),
        "y" | "yes" => Ok(Command::Confirm(true)),
        "n" | "no" => Ok(Command::Confirm(false)),
        "answer" | "a" => {
            let (Some(question), Some(option), None) = (words.next(), words.next(), words.next())
            else {
                return Err(CommandError::AnswerUsage);
            };
            let question = question
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(CommandError::AnswerUsage)?;
            Ok(Command::Answer {
                question: question - 1,
                choice: parse_option(option)?,
            })
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Accepts `b`/`B` or `2` for the second option.
fn parse_option(raw: &str) -> Result<usize, CommandError> {
    let bad = || CommandError::BadOption(raw.to_string());
    if let Ok(number) = raw.parse::<usize>() {
        return number.checked_sub(1).ok_or_else(bad);
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Ok((letter.to_ascii_lowercase() as u8 - b'a') as usize)
        }
        _ => Err(bad()),
    }
}

/// Letter shown next to an option.
pub fn option_label(index: usize) -> char {
    if index < 26 {
        (b'A' + index as u8) as char
    } else {
        '?'
    }
}
