//! services/client/src/session.rs
//!
//! Loads and stores the bearer token the backend expects. The token is turned
//! into an explicit `AuthContext` that is handed to every port call.

use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::LocalConfig;
use crate::error::ClientError;
use model_test_core::{AuthContext, PortError};

#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
    token_override: Option<String>,
}

impl TokenStore {
    pub fn new(path: PathBuf, token_override: Option<String>) -> Self {
        Self {
            path,
            token_override,
        }
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(config.token_path.clone(), config.token_override.clone())
    }

    /// Returns the current session. No token means `Unauthorized`, the cue to log in.
    pub async fn load(&self) -> Result<AuthContext, ClientError> {
        if let Some(token) = &self.token_override {
            debug!("Using token from the environment.");
            return Ok(AuthContext::from_token(Some(token.clone()))?);
        }
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(AuthContext::from_token(Some(contents))?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PortError::Unauthorized.into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, token: &str) -> Result<(), ClientError> {
        let auth = AuthContext::from_token(Some(token.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, auth.token()).await?;
        info!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Forgets the stored token, e.g. after the backend rejected it.
    pub async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Token removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
