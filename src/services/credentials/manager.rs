use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::endpoint::{EndpointError, TokenEndpoint};
use super::store::TokenStore;
use super::types::{AuthState, Credential, CredentialError, CredentialStatus, TokenMaterial};

const AUTHENTICATE_HINT: &str = "authenticate via /admin/login";

struct Inner {
    state: AuthState,
    /// A refresh token the provider has already refused. Not retried until
    /// the stored material changes.
    rejected_refresh_token: Option<String>,
    /// Set when the mail API refused the current access token.
    force_refresh: bool,
}

/// Owns the authentication state machine.
///
/// The token file is re-read on every call, so another process can replace
/// or delete it at any time; this type never caches token material.
pub struct CredentialManager {
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    expected_account: Option<String>,
    inner: Mutex<Inner>,
}

impl CredentialManager {
    pub fn new(
        store: TokenStore,
        endpoint: Arc<dyn TokenEndpoint>,
        expected_account: Option<String>,
    ) -> Self {
        Self {
            store,
            endpoint,
            expected_account: expected_account.map(|a| a.to_lowercase()),
            inner: Mutex::new(Inner {
                state: AuthState::Unauthenticated,
                rejected_refresh_token: None,
                force_refresh: false,
            }),
        }
    }

    pub fn state(&self) -> AuthState {
        self.lock().state
    }

    pub fn authorization_url(&self, state: &str) -> String {
        self.endpoint.authorization_url(state)
    }

    /// Return a usable credential, refreshing it if it has expired.
    ///
    /// Fails with `AuthRequired` when there is no token material, when it has
    /// expired and cannot be refreshed, or when the provider refused the refresh.
    /// A transport failure during refresh is reported as `Endpoint` and leaves
    /// the state alone.
    pub async fn get_valid_credential(&self) -> Result<Credential, CredentialError> {
        let now = Utc::now();

        let material = match self.store.load() {
            Ok(Some(material)) => material,
            Ok(None) => {
                self.transition(AuthState::Unauthenticated);
                return Err(CredentialError::AuthRequired(format!(
                    "no stored token, {}",
                    AUTHENTICATE_HINT
                )));
            }
            Err(e) => {
                tracing::warn!("⚠ Could not load token file: {}", e);
                self.transition(AuthState::Unauthenticated);
                return Err(CredentialError::AuthRequired(format!(
                    "stored token is unreadable, {}",
                    AUTHENTICATE_HINT
                )));
            }
        };

        self.check_account(&material)?;

        let force_refresh = std::mem::take(&mut self.lock().force_refresh);
        if !force_refresh && !material.is_expired(now) {
            self.transition(AuthState::Authenticated);
            return Ok(Credential::from_material(&material));
        }

        let Some(refresh_token) = material.refresh_token.clone() else {
            self.transition(AuthState::AuthenticationExpired);
            return Err(CredentialError::AuthRequired(format!(
                "token expired and cannot be refreshed, {}",
                AUTHENTICATE_HINT
            )));
        };

        if self.lock().rejected_refresh_token.as_deref() == Some(refresh_token.as_str()) {
            self.transition(AuthState::AuthenticationExpired);
            return Err(CredentialError::AuthRequired(format!(
                "token expired or revoked, {}",
                AUTHENTICATE_HINT
            )));
        }

        tracing::info!("⟳ Refreshing expired token...");
        match self.endpoint.refresh(&refresh_token).await {
            Ok(grant) => {
                let refreshed = material.refreshed(grant, Utc::now());
                if let Err(e) = self.store.save(&refreshed) {
                    tracing::warn!("⚠ Could not save refreshed token: {}", e);
                }
                tracing::info!("✓ Token refreshed successfully");
                self.lock().rejected_refresh_token = None;
                self.transition(AuthState::Authenticated);
                Ok(Credential::from_material(&refreshed))
            }
            Err(EndpointError::Rejected(reason)) => {
                tracing::warn!("⚠ Token refresh rejected: {}", reason);
                self.lock().rejected_refresh_token = Some(refresh_token);
                self.transition(AuthState::AuthenticationExpired);
                Err(CredentialError::AuthRequired(format!(
                    "token refresh rejected ({}), {}",
                    reason, AUTHENTICATE_HINT
                )))
            }
            Err(e) => {
                // Try again next time even if the token has not expired yet.
                self.lock().force_refresh = force_refresh;
                Err(CredentialError::Endpoint(e))
            }
        }
    }

    /// The mail API refused an access token we considered valid. The next
    /// `get_valid_credential` refreshes instead of reusing it.
    pub fn report_rejected(&self) {
        self.lock().force_refresh = true;
    }

    /// An external trigger removed (or is about to remove) the token
    /// material. The next `get_valid_credential` confirms its absence.
    pub fn mark_reauthentication_pending(&self) {
        let mut inner = self.lock();
        if inner.state != AuthState::Unauthenticated {
            tracing::info!(
                "Credential state: {:?} -> {:?}",
                inner.state,
                AuthState::ReauthenticationPending
            );
            inner.state = AuthState::ReauthenticationPending;
        }
    }

    /// Remove the stored token material. Returns whether anything was removed.
    pub fn invalidate(&self) -> Result<bool, CredentialError> {
        let removed = self.store.remove()?;
        if removed {
            tracing::info!("Token material removed from {}", self.store.path().display());
            self.mark_reauthentication_pending();
        } else {
            self.transition(AuthState::Unauthenticated);
        }
        Ok(removed)
    }

    /// Complete an authorization-code exchange and store the result.
    ///
    /// When an expected account is configured the token's identity is
    /// confirmed first; a mismatch (or failure to confirm) removes any stored
    /// token material and fails.
    pub async fn complete_authorization(&self, code: &str) -> Result<Credential, CredentialError> {
        let grant = self.endpoint.exchange_code(code).await?;
        let mut material = TokenMaterial::from_grant(grant, Utc::now());
        if material.refresh_token.is_none() {
            tracing::warn!(
                "⚠ Authorization returned no refresh token; re-authenticate on expiry"
            );
        }

        match &self.expected_account {
            Some(expected) => {
                let actual = match self.endpoint.account_identity(&material.access_token).await {
                    Ok(actual) => actual,
                    Err(e) => {
                        self.discard_material();
                        return Err(CredentialError::Endpoint(e));
                    }
                };
                if !actual.eq_ignore_ascii_case(expected) {
                    tracing::error!(
                        "✗ Gmail account mismatch: expected {}, got {}",
                        expected,
                        actual
                    );
                    self.discard_material();
                    return Err(CredentialError::IdentityMismatch {
                        expected: expected.clone(),
                        actual,
                    });
                }
                material.account = Some(actual.to_lowercase());
            }
            None => match self.endpoint.account_identity(&material.access_token).await {
                Ok(actual) => material.account = Some(actual.to_lowercase()),
                Err(e) => tracing::warn!("Could not look up authenticated account: {}", e),
            },
        }

        self.store.save(&material)?;
        {
            let mut inner = self.lock();
            inner.rejected_refresh_token = None;
            inner.force_refresh = false;
        }
        self.transition(AuthState::Authenticated);
        tracing::info!(
            "✓ Authenticated as: {}",
            material.account.as_deref().unwrap_or("unknown account")
        );
        Ok(Credential::from_material(&material))
    }

    /// Report state plus what is on disk, without touching the network.
    pub fn inspect(&self) -> CredentialStatus {
        let material = self.store.load().ok().flatten();
        let state = match (&material, self.state()) {
            (None, _) => AuthState::Unauthenticated,
            // Nothing has used the material in this process yet.
            (Some(m), AuthState::Unauthenticated) => {
                if m.is_expired(Utc::now()) && !m.can_refresh() {
                    AuthState::AuthenticationExpired
                } else {
                    AuthState::Authenticated
                }
            }
            (Some(_), state) => state,
        };
        CredentialStatus {
            state,
            token_present: material.is_some(),
            can_refresh: material.as_ref().is_some_and(TokenMaterial::can_refresh),
            account: material.as_ref().and_then(|m| m.account.clone()),
            expires_at: material.as_ref().and_then(|m| m.expires_at),
        }
    }

    /// Stored material for a different account than expected is unusable.
    fn check_account(&self, material: &TokenMaterial) -> Result<(), CredentialError> {
        match (&self.expected_account, &material.account) {
            (Some(expected), Some(actual)) if !actual.eq_ignore_ascii_case(expected) => {
                tracing::error!("✗ Stored token belongs to {}, expected {}", actual, expected);
                self.discard_material();
                Err(CredentialError::IdentityMismatch {
                    expected: expected.clone(),
                    actual: actual.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn discard_material(&self) {
        if let Err(e) = self.store.remove() {
            tracing::error!("✗ Could not remove token material: {}", e);
        }
        self.transition(AuthState::Unauthenticated);
    }

    fn transition(&self, to: AuthState) {
        let mut inner = self.lock();
        if inner.state != to {
            tracing::info!("Credential state: {:?} -> {:?}", inner.state, to);
            inner.state = to;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain flags; a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
