use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::types::{ClientSecrets, GMAIL_READONLY_SCOPE};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// OAuth error codes that mean the grant itself is dead. Anything else
/// (throttling, server trouble) is worth retrying.
const GRANT_REJECTIONS: &[&str] = &["invalid_grant", "invalid_client", "unauthorized_client"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EndpointError {
    /// The provider refused the grant (revoked, `invalid_grant`, bad code).
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// The opaque "obtain / refresh credential" capability.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Where to send an operator to grant access.
    fn authorization_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, EndpointError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, EndpointError>;
    /// The account an access token belongs to.
    async fn account_identity(&self, access_token: &str) -> Result<String, EndpointError>;
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: String,
}

/// Google OAuth 2.0 token endpoint plus the Gmail profile call for identity.
pub struct GoogleOAuthClient {
    client: Client,
    secrets: ClientSecrets,
    redirect_url: String,
    api_base: String,
}

impl GoogleOAuthClient {
    pub fn new(secrets: ClientSecrets, redirect_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            secrets,
            redirect_url,
            api_base: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, EndpointError> {
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenGrant>()
                .await
                .map_err(|e| EndpointError::Parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<OAuthErrorBody>(&body).ok();
        let rejected = matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
            && parsed
                .as_ref()
                .is_some_and(|err| GRANT_REJECTIONS.contains(&err.error.as_str()));
        let reason = match parsed {
            Some(OAuthErrorBody {
                error,
                error_description: Some(description),
            }) => format!("{} ({})", error, description),
            Some(err) => err.error,
            None => format!("HTTP {}", status),
        };

        if rejected {
            Err(EndpointError::Rejected(reason))
        } else {
            Err(EndpointError::Transport(reason))
        }
    }
}

#[async_trait]
impl TokenEndpoint for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        match url::Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", GMAIL_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        ) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!("Invalid auth_uri {:?}: {}", self.secrets.auth_uri, e);
                self.secrets.auth_uri.clone()
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, EndpointError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, EndpointError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ])
        .await
    }

    async fn account_identity(&self, access_token: &str) -> Result<String, EndpointError> {
        let response = self
            .client
            .get(format!("{}/users/me/profile", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<ProfileResponse>()
                .await
                .map(|p| p.email_address.to_lowercase())
                .map_err(|e| EndpointError::Parse(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(EndpointError::Rejected(format!("profile returned {}", response.status())))
            }
            status => Err(EndpointError::Transport(format!("profile returned {}", status))),
        }
    }
}
