pub mod config;
pub mod modules;
pub mod services;

use axum::{middleware, routing::get, Router};
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::Config;
use modules::admin::admin_routes;
use modules::status::{controller::index, status_routes};
use services::credentials::{CredentialManager, ReauthTrigger};
use services::rate_limit::{create_rate_limiter, limit_requests};
use services::security::security_headers;
use services::state::StateStore;

pub struct AppState {
    pub config: Arc<Config>,
    pub state_store: StateStore,
    /// `None` when no OAuth client secrets are available; admin routes then
    /// answer 503 while the public routes keep working.
    pub credentials: Option<Arc<CredentialManager>>,
    pub trigger: Option<ReauthTrigger>,
    /// One-time `state` values handed out by `/admin/login`.
    pub pending_logins: Mutex<Vec<String>>,
}

impl AppState {
    pub fn new(config: Config, credentials: Option<Arc<CredentialManager>>) -> Self {
        let trigger = credentials
            .clone()
            .map(|manager| ReauthTrigger::new(manager, config.reload_socket.clone()));
        Self {
            state_store: StateStore::new(config.state_file.clone()),
            config: Arc::new(config),
            credentials,
            trigger,
            pending_logins: Mutex::new(Vec::new()),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    // Admin: burst of 10, then 30 per minute
    let admin_limiter = create_rate_limiter(30, 10);

    Router::new()
        .route("/", get(index))
        .nest("/api", status_routes().layer(CorsLayer::permissive()))
        .nest(
            "/admin",
            admin_routes(state.clone())
                .layer(middleware::from_fn_with_state(admin_limiter, limit_requests)),
        )
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 16)) // 16KB max body
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
