//! services/client/src/cli.rs
//!
//! Command-line interface of the `model-test` binary.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "model-test")]
#[command(about = "Take timed model tests from the terminal")]
#[command(
    after_help = "Environment:\n  MODEL_TEST_API_URL     Backend base URL\n  MODEL_TEST_TOKEN       Token that overrides the token file\n  MODEL_TEST_TOKEN_FILE  Where the token is stored"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Take a test, resuming your open attempt of it if there is one
    Take {
        test_id: String,
        /// Resume this attempt instead of looking one up
        #[arg(long)]
        resume: Option<String>,
    },
    /// List your past attempts
    History,
    /// Manage the stored login token
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum TokenCommand {
    Set { token: String },
    Clear,
}
