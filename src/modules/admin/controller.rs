use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::{Redirect, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::modules::admin::schema::{AdminError, CallbackQuery, CallbackResponse};
use crate::services::credentials::{
    CredentialManager, CredentialStatus, ReauthOutcome, ReauthTrigger,
};
use crate::AppState;

/// Outstanding login attempts kept at most; older ones are dropped.
const MAX_PENDING_LOGINS: usize = 16;

/// Bearer check against `ADMIN_TOKEN`. Open when no token is configured.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AdminError> {
    if let Some(expected) = &state.config.admin_token {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let matches =
            presented.is_some_and(|p| constant_time_eq(p.as_bytes(), expected.as_bytes()));
        if !matches {
            tracing::warn!("⚠ Rejected admin request to {}", request.uri().path());
            return Err(AdminError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CredentialStatus>, AdminError> {
    Ok(Json(credentials(&state)?.inspect()))
}

pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, AdminError> {
    let manager = credentials(&state)?;
    let login_state = Uuid::new_v4().to_string();

    {
        let mut pending = state.pending_logins.lock().unwrap_or_else(|p| p.into_inner());
        if pending.len() >= MAX_PENDING_LOGINS {
            pending.remove(0);
        }
        pending.push(login_state.clone());
    }

    tracing::info!("Starting OAuth login");
    Ok(Redirect::to(&manager.authorization_url(&login_state)))
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AdminError> {
    let manager = credentials(&state)?;

    let login_state = query.state.ok_or(AdminError::InvalidState)?;
    let known = {
        let mut pending = state.pending_logins.lock().unwrap_or_else(|p| p.into_inner());
        match pending.iter().position(|s| *s == login_state) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    };
    if !known {
        return Err(AdminError::InvalidState);
    }

    if let Some(error) = query.error {
        tracing::warn!("⚠ OAuth consent not granted: {}", error);
        return Err(AdminError::ConsentDenied(error));
    }
    let code = query.code.ok_or(AdminError::MissingCode)?;

    let credential = manager.complete_authorization(&code).await?;
    let poller_notified = match &state.trigger {
        Some(trigger) => trigger.notify_poller().await,
        None => false,
    };

    Ok(Json(CallbackResponse {
        account: credential.account_identity,
        poller_notified,
    }))
}

pub async fn logout(State(state): State<Arc<AppState>>) -> Result<Json<ReauthOutcome>, AdminError> {
    Ok(Json(trigger(&state)?.request_reauthentication().await?))
}

fn credentials(state: &AppState) -> Result<&Arc<CredentialManager>, AdminError> {
    state.credentials.as_ref().ok_or(AdminError::NotConfigured)
}

fn trigger(state: &AppState) -> Result<&ReauthTrigger, AdminError> {
    state.trigger.as_ref().ok_or(AdminError::NotConfigured)
}
