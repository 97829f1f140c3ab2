use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::services::credentials::endpoint::GMAIL_API_BASE;
use crate::services::monitor::FetchError;

use super::extractor::GmailMessage;

#[derive(Debug, thiserror::Error)]
pub enum GmailError {
    /// The access token was refused.
    #[error("Gmail API returned {0}")]
    Unauthorized(StatusCode),

    #[error("Gmail API returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected Gmail response: {0}")]
    Parse(String),
}

impl From<GmailError> for FetchError {
    fn from(err: GmailError) -> Self {
        match err {
            GmailError::Unauthorized(_) => FetchError::Auth(err.to_string()),
            _ => FetchError::Transient(err.to_string()),
        }
    }
}

/// Where the latest notification message comes from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn latest_message(&self, access_token: &str) -> Result<Option<GmailMessage>, GmailError>;
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

pub struct GmailClient {
    client: Client,
    api_base: String,
    query: String,
}

impl GmailClient {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_base: GMAIL_API_BASE.to_string(),
            query: query.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GmailError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GmailError::Unauthorized(status));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::Http { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GmailError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn latest_message(&self, access_token: &str) -> Result<Option<GmailMessage>, GmailError> {
        let list: MessageList = self
            .get_json(
                format!("{}/users/me/messages", self.api_base),
                access_token,
                &[("q", self.query.as_str()), ("maxResults", "1")],
            )
            .await?;

        let Some(latest) = list.messages.into_iter().next() else {
            return Ok(None);
        };

        let message = self
            .get_json(
                format!("{}/users/me/messages/{}", self.api_base, latest.id),
                access_token,
                &[("format", "full")],
            )
            .await?;
        Ok(Some(message))
    }
}
