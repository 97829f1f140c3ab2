use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::services::reload::request_reload;

use super::manager::CredentialManager;
use super::types::CredentialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReauthOutcome {
    /// Token material was removed. `poller_notified` is false when the
    /// poller was not listening; it will notice on its next cycle instead.
    Invalidated { poller_notified: bool },
    AlreadyUnauthenticated,
}

/// Operator-facing "log out and re-authenticate" action, usable from a
/// different process than the poller.
pub struct ReauthTrigger {
    credentials: Arc<CredentialManager>,
    reload_socket: PathBuf,
}

impl ReauthTrigger {
    pub fn new(credentials: Arc<CredentialManager>, reload_socket: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            reload_socket: reload_socket.into(),
        }
    }

    /// Remove stored credentials and nudge the poller. Idempotent.
    pub async fn request_reauthentication(&self) -> Result<ReauthOutcome, CredentialError> {
        if !self.credentials.invalidate()? {
            tracing::info!("Re-authentication requested but no token is stored");
            return Ok(ReauthOutcome::AlreadyUnauthenticated);
        }

        let poller_notified = self.notify_poller().await;
        Ok(ReauthOutcome::Invalidated { poller_notified })
    }

    /// Best-effort: tell the poller to re-check token material now.
    pub async fn notify_poller(&self) -> bool {
        match request_reload(&self.reload_socket).await {
            Ok(true) => {
                tracing::info!("Poller notified to re-check credentials");
                true
            }
            Ok(false) => {
                tracing::info!("Poller not listening; it will re-check on its next cycle");
                false
            }
            Err(e) => {
                tracing::warn!("Could not notify poller: {}", e);
                false
            }
        }
    }
}
