//! services/client/src/app.rs
//!
//! Defines the shared application state and the top-level operations the
//! binary dispatches to.

use model_test_core::{
    initialize_attempt, AttemptController, AttemptId, Clock, ModelTestService, PortError, TestId,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing::{error, info, warn};

use crate::adapters::{HttpModelTestAdapter, SystemClock};
use crate::config::Config;
use crate::error::ClientError;
use crate::session::TokenStore;
use crate::terminal::render::render_history;
use crate::terminal::{run_attempt, AttemptExit};

/// The application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ModelTestService>,
    pub clock: Arc<dyn Clock>,
    pub tokens: TokenStore,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let api = HttpModelTestAdapter::from_config(config)?;
        Ok(Self {
            api: Arc::new(api),
            clock: Arc::new(SystemClock),
            tokens: TokenStore::from_config(&config.local),
        })
    }

    /// Runs one attempt of `test_id` in the terminal, resuming where possible.
    pub async fn take_test<R, W>(
        &self,
        test_id: &TestId,
        resume: Option<&AttemptId>,
        input: R,
        out: &mut W,
    ) -> Result<AttemptExit, ClientError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let auth = self.tokens.load().await?;

        let hydrated = match initialize_attempt(
            self.api.as_ref(),
            self.clock.as_ref(),
            &auth,
            test_id,
            resume,
        )
        .await
        {
            Ok(hydrated) => hydrated,
            Err(e) => {
                error!("Could not open test {}: {}", test_id, e);
                return Err(self.reject(e).await);
            }
        };

        if hydrated.resumed {
            writeln!(
                out,
                "Resuming attempt {} ({} answers restored).",
                hydrated.attempt_id,
                hydrated.answers.len()
            )?;
        } else {
            writeln!(out, "Started attempt {}.", hydrated.attempt_id)?;
        }

        let (controller, events) = AttemptController::launch(self.api.clone(), auth, hydrated);
        match run_attempt(controller, events, input, out).await {
            Ok(exit) => {
                info!("Attempt session ended: {:?}", exit);
                Ok(exit)
            }
            Err(ClientError::Port(e)) => {
                error!("Attempt session aborted: {}", e);
                Err(self.reject(e).await)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn history<W: Write>(&self, out: &mut W) -> Result<(), ClientError> {
        let auth = self.tokens.load().await?;
        match self.api.list_history(&auth).await {
            Ok(attempts) => {
                writeln!(out, "{}", render_history(&attempts))?;
                Ok(())
            }
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// A rejected token is forgotten so the next run asks for a new one.
    async fn reject(&self, error: PortError) -> ClientError {
        if error == PortError::Unauthorized {
            if let Err(e) = self.tokens.clear().await {
                warn!("Failed to remove the rejected token: {}", e);
            }
        }
        ClientError::Port(error)
    }
}
