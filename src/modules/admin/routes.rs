use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;
use super::controller;

/// Login and callback are browser redirects and are protected by the
/// one-time `state` instead of the bearer token.
pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let guarded = Router::new()
        .route("/status", get(controller::status))
        .route("/logout", post(controller::logout))
        .route_layer(middleware::from_fn_with_state(state, controller::require_admin_token));

    Router::new()
        .route("/login", get(controller::login))
        .route("/callback", get(controller::callback))
        .merge(guarded)
}
