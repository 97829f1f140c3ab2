use std::process::ExitCode;
use std::sync::Arc;

use livetrack_relay::config::{logging, Config};
use livetrack_relay::services::credentials::{
    ClientSecrets, CredentialManager, GoogleOAuthClient, TokenStore,
};
use livetrack_relay::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init("livetrack_relay=debug,tower_http=debug");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("✗ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let credentials = match ClientSecrets::load(&config.credentials_file) {
        Ok(secrets) => {
            let redirect_url = config
                .oauth_redirect_url
                .clone()
                .unwrap_or_else(|| config.default_redirect_url());
            let endpoint = GoogleOAuthClient::new(secrets, redirect_url);
            Some(Arc::new(CredentialManager::new(
                TokenStore::new(config.token_file.clone()),
                Arc::new(endpoint),
                config.expected_account.clone(),
            )))
        }
        Err(e) => {
            tracing::warn!("⚠ Admin login disabled: {}", e);
            None
        }
    };

    if config.admin_token.is_none() {
        tracing::warn!("⚠ ADMIN_TOKEN is not set; /admin/status and /admin/logout are open");
    }

    let port = config.port;
    let app = livetrack_relay::create_app(AppState::new(config, credentials));

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("✗ Could not bind port {}: {}", port, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Server running on http://localhost:{}", port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
    {
        tracing::error!("✗ Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
