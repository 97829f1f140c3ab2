use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::endpoint::{EndpointError, TokenGrant};

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    AuthenticationExpired,
    ReauthenticationPending,
}

/// Durable token material, as stored in the token file.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMaterial {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl TokenMaterial {
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: grant.expires_in.map(|secs| now + Duration::seconds(secs)),
            scopes: grant.scopes(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            account: None,
        }
    }

    /// Apply a refresh grant. Google usually omits the refresh token on
    /// refresh, in which case the existing one is kept.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let scopes = grant.scopes();
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: grant.expires_in.map(|secs| now + Duration::seconds(secs)),
            account: self.account.clone(),
            scopes: if scopes.is_empty() { self.scopes.clone() } else { scopes },
        }
    }

    /// Tokens without an expiry are treated as valid until the API rejects them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for TokenMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMaterial")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("account", &self.account)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// A credential handed to the fetch path.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub is_valid: bool,
    pub can_refresh: bool,
    pub account_identity: Option<String>,
}

impl Credential {
    pub fn from_material(material: &TokenMaterial) -> Self {
        Self {
            access_token: material.access_token.clone(),
            is_valid: true,
            can_refresh: material.can_refresh(),
            account_identity: material.account.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("is_valid", &self.is_valid)
            .field("can_refresh", &self.can_refresh)
            .field("account_identity", &self.account_identity)
            .finish()
    }
}

/// What an operator sees about the credential, without any network call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialStatus {
    pub state: AuthState,
    pub token_present: bool,
    pub can_refresh: bool,
    pub account: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{0}")]
    AuthRequired(String),

    #[error("account mismatch: expected {expected}, authenticated as {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("token endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("credential storage error: {0}")]
    Storage(String),

    #[error("client secrets error: {0}")]
    Secrets(String),
}

/// OAuth client registration, read from the JSON Google hands out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let file: ClientSecretsFile =
            serde_json::from_str(raw).map_err(|e| CredentialError::Secrets(e.to_string()))?;
        file.web.or(file.installed).ok_or_else(|| {
            CredentialError::Secrets("expected a 'web' or 'installed' entry".to_string())
        })
    }

    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CredentialError::Secrets(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }
}
