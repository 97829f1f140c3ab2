use axum::{routing::get, Router};
use std::sync::Arc;

use crate::AppState;
use super::controller;

pub fn status_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/current", get(controller::get_current))
        .route("/health", get(controller::health))
}
