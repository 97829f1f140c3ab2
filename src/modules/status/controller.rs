use axum::{extract::State, response::Html, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::modules::status::schema::HealthResponse;
use crate::services::classifier::{classify, producer_health, ActivityStatus};
use crate::services::state::StoredState;
use crate::AppState;

const INDEX_TEMPLATE: &str = include_str!("../../../static/index.html");

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(INDEX_TEMPLATE.replace("{{app_title}}", &escape_html(&state.config.app_title)))
}

pub async fn get_current(State(state): State<Arc<AppState>>) -> Json<ActivityStatus> {
    let status = match state.state_store.read() {
        StoredState::Present(snapshot) => classify(
            &snapshot,
            Utc::now(),
            state.config.max_age_hours,
            state.config.dead_age_hours,
        ),
        other => {
            if let Some(error) = other.error() {
                tracing::debug!("No usable state: {}", error);
            }
            ActivityStatus::waiting()
        }
    };
    Json(status)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stored = state.state_store.read();
    let producer = producer_health(&stored, Utc::now(), state.config.health_window());
    Json(HealthResponse::new(producer))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
