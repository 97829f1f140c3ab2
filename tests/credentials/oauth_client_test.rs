// =============================================================================
// INTEGRATION TESTS - GOOGLE OAUTH CLIENT
// Token endpoint and profile lookup against a mock server
// =============================================================================

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use livetrack_relay::services::credentials::{
    AuthState, ClientSecrets, CredentialError, CredentialManager, EndpointError,
    GoogleOAuthClient, TokenEndpoint, TokenStore,
};

use crate::common::material;

fn client(server: &MockServer) -> GoogleOAuthClient {
    let secrets = ClientSecrets::from_json(
        &json!({
            "installed": {
                "client_id": "client-123.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": format!("{}/auth", server.uri()),
                "token_uri": format!("{}/token", server.uri()),
                "redirect_uris": ["http://localhost"]
            }
        })
        .to_string(),
    )
    .unwrap();
    GoogleOAuthClient::new(secrets, "http://localhost:5000/admin/callback".to_string())
        .with_api_base(server.uri())
}

#[tokio::test]
async fn test_authorization_url_requests_offline_readonly_access() {
    let server = MockServer::start().await;
    let url = url::Url::parse(&client(&server).authorization_url("state-1")).unwrap();

    let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(url.path(), "/auth");
    assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
    assert_eq!(params["redirect_uri"], "http://localhost:5000/admin/callback");
    assert_eq!(params["scope"], "https://www.googleapis.com/auth/gmail.readonly");
    assert_eq!(params["access_type"], "offline");
    assert_eq!(params["prompt"], "consent");
    assert_eq!(params["state"], "state-1");
}

#[tokio::test]
async fn test_exchange_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/gmail.readonly",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = client(&server).exchange_code("abc").await.unwrap();
    assert_eq!(grant.access_token, "at");
    assert_eq!(grant.refresh_token.as_deref(), Some("rt"));
    assert_eq!(grant.expires_in, Some(3599));
    assert_eq!(grant.scopes(), vec!["https://www.googleapis.com/auth/gmail.readonly"]);
}

#[tokio::test]
async fn test_revoked_refresh_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let err = client(&server).refresh("rt").await.unwrap_err();
    assert_eq!(
        err,
        EndpointError::Rejected("invalid_grant (Token has been expired or revoked.)".into())
    );
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).refresh("rt").await.unwrap_err();
    assert!(matches!(err, EndpointError::Transport(_)));
}

#[tokio::test]
async fn test_throttling_and_bad_requests_are_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": "rate_limit_exceeded"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.refresh("rt").await.unwrap_err(),
        EndpointError::Transport("rate_limit_exceeded".into())
    );
    assert_eq!(
        client.refresh("rt").await.unwrap_err(),
        EndpointError::Transport("invalid_request".into())
    );
}

#[tokio::test]
async fn test_throttled_refresh_is_retried_next_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": "rate_limit_exceeded"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=rt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    let store = TokenStore::new(&path);
    store
        .save(&material("at-1", Some("rt"), Utc::now() - Duration::minutes(5)))
        .unwrap();
    let manager = CredentialManager::new(TokenStore::new(&path), Arc::new(client(&server)), None);

    let err = manager.get_valid_credential().await.unwrap_err();
    assert!(matches!(err, CredentialError::Endpoint(EndpointError::Transport(_))));
    assert_ne!(manager.state(), AuthState::AuthenticationExpired);

    let credential = manager.get_valid_credential().await.unwrap();
    assert_eq!(credential.access_token, "at-2");
    assert_eq!(manager.state(), AuthState::Authenticated);
    assert_eq!(store.load().unwrap().unwrap().refresh_token.as_deref(), Some("rt"));
}

#[tokio::test]
async fn test_account_identity_from_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/profile"))
        .and(header("authorization", "Bearer at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "emailAddress": "Rider@Example.com",
            "messagesTotal": 10
        })))
        .mount(&server)
        .await;

    assert_eq!(
        client(&server).account_identity("at").await.unwrap(),
        "rider@example.com"
    );

    let err = client(&server).account_identity("other").await.unwrap_err();
    assert!(matches!(err, EndpointError::Transport(_)));
}

#[test]
fn test_client_secrets_formats() {
    let web = ClientSecrets::from_json(r#"{"web": {"client_id": "id", "client_secret": "s"}}"#)
        .unwrap();
    assert_eq!(web.token_uri, "https://oauth2.googleapis.com/token");
    assert!(ClientSecrets::from_json(r#"{"other": {}}"#).is_err());
    assert!(ClientSecrets::from_json("not json").is_err());
}
