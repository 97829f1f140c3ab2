use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::services::monitor::TrackedEvent;

/// Gmail encodes bodies as base64url, with or without padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s<>"]*livetrack[^\s<>"]*"#).unwrap());
static DATE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn find_part(&self, mime_type: &str) -> Option<&MessagePart> {
        if self.mime_type.eq_ignore_ascii_case(mime_type) && self.body.data.is_some() {
            return Some(self);
        }
        self.parts.iter().find_map(|part| part.find_part(mime_type))
    }
}

/// Turn a full Gmail message into a tracked event. `None` when the message
/// carries no LiveTrack link.
pub fn extract_event(message: &GmailMessage) -> Option<TrackedEvent> {
    let body = message_body(&message.payload)?;
    let url = extract_url(&body)?;

    Some(TrackedEvent {
        event_id: message.id.clone(),
        subject: message.payload.header("Subject").map(str::to_string),
        url: Some(url),
        source_timestamp: message_timestamp(message),
    })
}

/// Prefer the HTML part, then plain text, then a single-part body.
pub fn message_body(payload: &MessagePart) -> Option<String> {
    let part = payload
        .find_part("text/html")
        .or_else(|| payload.find_part("text/plain"))
        .or_else(|| payload.body.data.as_ref().map(|_| payload))?;

    let data = part.body.data.as_deref()?;
    match BODY_ENGINE.decode(data.trim()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("Could not decode message body: {}", e);
            None
        }
    }
}

/// Find the LiveTrack link: first a "View/Afficher ... LiveTrack" anchor,
/// then any bare LiveTrack URL in the body.
pub fn extract_url(body: &str) -> Option<String> {
    for anchor in ANCHOR.captures_iter(body) {
        let href = anchor[1].replace("&amp;", "&");
        let text = TAG.replace_all(&anchor[2], "");
        let text = text.trim();
        let labelled =
            text.contains("LiveTrack") && (text.contains("Afficher") || text.contains("View"));
        if labelled && href.to_lowercase().contains("livetrack") {
            return Some(href);
        }
    }

    BARE_URL
        .find(body)
        .map(|m| m.as_str().replace("&amp;", "&"))
}

/// The `Date` header, falling back to Gmail's `internalDate` (epoch millis).
pub fn message_timestamp(message: &GmailMessage) -> Option<DateTime<Utc>> {
    if let Some(raw) = message.payload.header("Date") {
        let cleaned = DATE_COMMENT.replace(raw, "");
        match DateTime::parse_from_rfc2822(cleaned.trim()) {
            Ok(parsed) => return Some(parsed.with_timezone(&Utc)),
            Err(e) => tracing::warn!("Could not parse email date {:?}: {}", raw, e),
        }
    }

    let millis = message.internal_date.as_deref()?.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
