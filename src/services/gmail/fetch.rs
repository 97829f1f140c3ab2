use std::sync::Arc;

use async_trait::async_trait;

use crate::services::credentials::{CredentialError, CredentialManager};
use crate::services::monitor::{FetchCapability, FetchError, TrackedEvent};

use super::client::{GmailError, MessageSource};
use super::extractor::extract_event;

/// Credential lookup, message fetch and link extraction in one capability.
pub struct AuthenticatedFetch {
    credentials: Arc<CredentialManager>,
    source: Arc<dyn MessageSource>,
}

impl AuthenticatedFetch {
    pub fn new(credentials: Arc<CredentialManager>, source: Arc<dyn MessageSource>) -> Self {
        Self { credentials, source }
    }
}

#[async_trait]
impl FetchCapability for AuthenticatedFetch {
    async fn fetch_latest(&self) -> Result<Option<TrackedEvent>, FetchError> {
        let credential = self.credentials.get_valid_credential().await.map_err(|e| match e {
            CredentialError::AuthRequired(reason) => FetchError::Auth(reason),
            other @ (CredentialError::IdentityMismatch { .. } | CredentialError::Secrets(_)) => {
                FetchError::Auth(other.to_string())
            }
            other => FetchError::Transient(other.to_string()),
        })?;

        let message = match self.source.latest_message(&credential.access_token).await {
            Ok(message) => message,
            Err(e @ GmailError::Unauthorized(_)) => {
                self.credentials.report_rejected();
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(message) = message else {
            return Ok(None);
        };

        match extract_event(&message) {
            Some(event) => Ok(Some(event)),
            None => {
                tracing::warn!("⚠ LiveTrack email {} has no link", message.id);
                Ok(None)
            }
        }
    }
}
