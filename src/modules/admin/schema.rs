use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::credentials::{CredentialError, EndpointError};

// =============================================================================
// CALLBACK
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Set by the provider when the operator declined consent.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub account: Option<String>,
    pub poller_notified: bool,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Invalid or missing admin token")]
    Unauthorized,

    #[error("OAuth client secrets are not configured")]
    NotConfigured,

    #[error("Unknown or expired login state")]
    InvalidState,

    #[error("Authorization was not granted: {0}")]
    ConsentDenied(String),

    #[error("Missing authorization code")]
    MissingCode,

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidState => StatusCode::BAD_REQUEST,
            Self::ConsentDenied(_) => StatusCode::FORBIDDEN,
            Self::MissingCode => StatusCode::BAD_REQUEST,
            Self::Credential(e) => match e {
                CredentialError::AuthRequired(_) => StatusCode::UNAUTHORIZED,
                CredentialError::IdentityMismatch { .. } => StatusCode::FORBIDDEN,
                CredentialError::Endpoint(EndpointError::Rejected(_)) => StatusCode::BAD_REQUEST,
                CredentialError::Endpoint(_) => StatusCode::BAD_GATEWAY,
                CredentialError::Storage(_) | CredentialError::Secrets(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("✗ Admin request failed: {}", self);
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
