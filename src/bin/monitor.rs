use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use livetrack_relay::config::{logging, Config};
use livetrack_relay::services::credentials::{
    ClientSecrets, CredentialManager, GoogleOAuthClient, TokenStore,
};
use livetrack_relay::services::gmail::{AuthenticatedFetch, GmailClient};
use livetrack_relay::services::monitor::MonitorEngine;
use livetrack_relay::services::reload::ReloadListener;
use livetrack_relay::services::state::StateStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init("livetrack_relay=info");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("✗ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Garmin LiveTrack Monitor Service");
    tracing::info!("State file: {}", config.state_file.display());
    match &config.expected_account {
        Some(account) => tracing::info!("Expected Gmail account: {}", account),
        None => tracing::warn!("⚠ GMAIL_ACCOUNT not set; account verification disabled"),
    }

    let store = StateStore::new(config.state_file.clone());
    if let Err(e) = store.prepare() {
        tracing::error!("✗ Cannot prepare state directory: {}", e);
        return ExitCode::FAILURE;
    }
    let store = Arc::new(store);

    let secrets = match ClientSecrets::load(&config.credentials_file) {
        Ok(secrets) => secrets,
        Err(e) => {
            tracing::error!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let redirect_url = config
        .oauth_redirect_url
        .clone()
        .unwrap_or_else(|| config.default_redirect_url());

    let credentials = Arc::new(CredentialManager::new(
        TokenStore::new(config.token_file.clone()),
        Arc::new(GoogleOAuthClient::new(secrets, redirect_url)),
        config.expected_account.clone(),
    ));
    let fetcher = AuthenticatedFetch::new(
        credentials.clone(),
        Arc::new(GmailClient::new(config.gmail_query.clone())),
    );

    let mut engine =
        MonitorEngine::new(Arc::new(fetcher), store, &config).with_credentials(credentials);
    engine.write_initial();

    match ReloadListener::bind(&config.reload_socket) {
        Ok(listener) => {
            tracing::info!("Listening for reload requests on {}", listener.path().display());
            engine = engine.with_reload(listener);
        }
        Err(e) => tracing::warn!(
            "⚠ Could not bind reload socket {}: {}; credentials re-read next cycle",
            config.reload_socket.display(),
            e
        ),
    }

    let cancel = CancellationToken::new();
    if let Err(e) = spawn_shutdown_listener(cancel.clone()) {
        tracing::error!("✗ Cannot install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    engine.run(cancel).await;
    ExitCode::SUCCESS
}

fn spawn_shutdown_listener(cancel: CancellationToken) -> std::io::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("Received SIGINT, shutting down..."),
            _ = terminate.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
        cancel.cancel();
    });
    Ok(())
}
