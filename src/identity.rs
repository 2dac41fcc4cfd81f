//! Identity provider for the classification service
//!
//! The classification service authorizes calls with an identity token printed by
//! a local tool (by default `gcloud auth print-identity-token`).

use crate::config::IdentitySection;
use crate::error::{TriageError, TriageResult};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Opaque bearer credential held in memory for one run
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for an `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***)")
    }
}

/// Source of the classification service's bearer credential
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identity_token(&self) -> TriageResult<Credential>;
}

/// Identity provider that runs a local command and reads the token from stdout
#[derive(Debug, Clone)]
pub struct CommandIdentityProvider {
    command: String,
    args: Vec<String>,
}

impl CommandIdentityProvider {
    pub fn new(config: &IdentitySection) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    /// Turn the tool's exit status and output into a credential
    fn credential_from_output(
        success: bool,
        code: Option<i32>,
        stdout: &[u8],
        stderr: &[u8],
    ) -> TriageResult<Credential> {
        if !success {
            let stderr = String::from_utf8_lossy(stderr);
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(TriageError::identity(format!(
                "identity command exited with {code}: {}",
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(stdout).trim().to_string();
        if token.is_empty() {
            return Err(TriageError::identity("identity command printed no token"));
        }

        Ok(Credential::new(token))
    }
}

#[async_trait]
impl IdentityProvider for CommandIdentityProvider {
    async fn identity_token(&self) -> TriageResult<Credential> {
        debug!(command = %self.command, "Requesting identity token");

        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                TriageError::identity(format!("failed to run '{}': {e}", self.command))
            })?;

        Self::credential_from_output(
            output.status.success(),
            output.status.code(),
            &output.stdout,
            &output.stderr,
        )
    }
}
