pub mod command;
pub mod render;
pub mod runner;

// Re-export the attempt loop so the binary can drive a session directly.
pub use runner::{run_attempt, AttemptExit};
