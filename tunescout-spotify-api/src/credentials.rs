//! Token lifecycle for the Spotify identity service.
//!
//! Two credentials are managed here:
//! 1. The app credential (client-credentials grant), cached in memory and
//!    used for all public catalog reads
//! 2. The user credential (authorization-code grant), persisted in the
//!    [`CredentialStore`] and used for library reads
//!
//! Nothing else in the workspace reads or writes the credential store.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use tunescout_core::{
    Clock, CredentialStore, Navigator, GENERIC_TOKEN_KEY, LOGIN_PATH, USER_ACCESS_TOKEN_KEY,
    USER_REFRESH_TOKEN_KEY, USER_TOKEN_EXPIRES_KEY,
};

use crate::config::SpotifyProviderConfig;
use crate::error::{Result, SpotifyError};

/// Scopes requested for the user session
pub const USER_SCOPES: &str = "user-library-read user-read-private user-read-email";

/// Length of the random `state` value sent with the authorization request
const STATE_LENGTH: usize = 16;

/// Token endpoint response, shared by all three grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    /// Lifetime in seconds
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Authorization URL plus the `state` value the callback must echo back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Cached app credential with its absolute expiry
#[derive(Debug, Clone)]
struct AppCredential {
    access_token: String,
    /// When this token expires (milliseconds since Unix epoch)
    expires_at_ms: u64,
}

impl AppCredential {
    const fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Manages Spotify app and user credentials.
pub struct CredentialManager {
    config: SpotifyProviderConfig,
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    app_credential: RwLock<Option<AppCredential>>,
    /// Serializes client-credentials exchanges
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(
        config: SpotifyProviderConfig,
        store: Arc<dyn CredentialStore>,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            store,
            http,
            clock,
            navigator,
            app_credential: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SpotifyProviderConfig {
        &self.config
    }

    /// Get a valid app token, exchanging client credentials if necessary.
    ///
    /// Concurrent callers at the expiry boundary share a single exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if the identity service rejects the
    /// exchange or answers with a malformed body, or
    /// [`SpotifyError::Network`] on transport failure.
    pub async fn app_token(&self) -> Result<String> {
        // Fast path: check if we have a valid cached token
        if let Some(token) = self.cached_app_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have finished the exchange while we waited
        if let Some(token) = self.cached_app_token().await {
            debug!("App token refreshed by a concurrent caller");
            return Ok(token);
        }

        info!("Requesting Spotify app token (client credentials)");
        let response = self
            .request_token(&[("grant_type", "client_credentials")])
            .await?;

        let expires_at_ms = self.expires_at(response.expires_in);
        let access_token = response.access_token;
        *self.app_credential.write().await = Some(AppCredential {
            access_token: access_token.clone(),
            expires_at_ms,
        });

        info!("Obtained Spotify app token, expires at {}", expires_at_ms);
        Ok(access_token)
    }

    async fn cached_app_token(&self) -> Option<String> {
        let now_ms = self.clock.now_ms();
        let guard = self.app_credential.read().await;
        match *guard {
            Some(ref credential) if credential.is_valid_at(now_ms) => {
                Some(credential.access_token.clone())
            }
            Some(_) => {
                debug!("Cached app token has expired");
                None
            }
            None => None,
        }
    }

    /// Drop the cached app credential, forcing an exchange on next request.
    pub async fn invalidate_app_token(&self) {
        *self.app_credential.write().await = None;
        debug!("Invalidated cached Spotify app token");
    }

    /// Build the URL that starts the user authorization flow.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if the configured accounts URL is not a
    /// valid base URL.
    pub fn authorization_url(&self) -> Result<AuthorizationRequest> {
        let state = random_state();
        let mut url = url::Url::parse(&format!(
            "{}/authorize",
            self.config.accounts_url.trim_end_matches('/')
        ))
        .map_err(|e| SpotifyError::auth(format!("invalid accounts_url: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", USER_SCOPES)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", &state);

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    /// Exchange an authorization code for a user credential and persist it.
    ///
    /// A failed exchange leaves any previously stored credential intact.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if the exchange is rejected, or
    /// [`SpotifyError::Store`] if the credential cannot be persisted.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
    ) -> Result<AuthorizationTokenResponse> {
        info!("Exchanging authorization code for user token");
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;

        self.persist_user_credential(&response).await?;
        info!("Spotify user session stored");
        Ok(response)
    }

    /// Get the persisted user token if present and unexpired.
    ///
    /// `Ok(None)` means there is no usable user session. Refresh tokens are
    /// never used here; see [`refresh_user_token`](Self::refresh_user_token).
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Store`] if the store cannot be read.
    pub async fn user_token(&self) -> Result<Option<String>> {
        let token = self
            .store
            .get(USER_ACCESS_TOKEN_KEY)
            .await?
            .filter(|token| !token.is_empty());
        let Some(token) = token else {
            return Ok(None);
        };

        let expires_at_ms = self
            .store
            .get(USER_TOKEN_EXPIRES_KEY)
            .await?
            .and_then(|value| value.trim().parse::<u64>().ok());
        let Some(expires_at_ms) = expires_at_ms else {
            warn!("Stored user token has no readable expiry, ignoring it");
            return Ok(None);
        };

        if self.clock.now_ms() >= expires_at_ms {
            debug!("Stored user token expired at {}", expires_at_ms);
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Exchange the stored refresh token for a new user access token.
    ///
    /// The stored refresh token is kept when the response carries none.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Auth`] if no refresh token is stored or the
    /// exchange is rejected.
    pub async fn refresh_user_token(&self) -> Result<String> {
        let refresh_token = self
            .store
            .get(USER_REFRESH_TOKEN_KEY)
            .await?
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SpotifyError::auth("no refresh token stored"))?;

        info!("Refreshing Spotify user token");
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
            ])
            .await?;

        self.persist_user_credential(&response).await?;
        Ok(response.access_token)
    }

    /// Remove the persisted user session.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Store`] if the store cannot be written.
    pub async fn clear_user_session(&self) -> Result<()> {
        for key in [
            USER_ACCESS_TOKEN_KEY,
            USER_REFRESH_TOKEN_KEY,
            USER_TOKEN_EXPIRES_KEY,
        ] {
            self.store.remove(key).await?;
        }
        info!("Cleared Spotify user session");
        Ok(())
    }

    /// Read the generic application auth token.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Store`] if the store cannot be read.
    pub async fn generic_auth_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(GENERIC_TOKEN_KEY).await?)
    }

    /// Store the generic application auth token.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Store`] if the store cannot be written.
    pub async fn set_generic_auth_token(&self, token: &str) -> Result<()> {
        Ok(self.store.set(GENERIC_TOKEN_KEY, token).await?)
    }

    /// Session policy for an unauthorized catalog response: clear the generic
    /// token, drop the cached app credential and send the user to login.
    pub async fn handle_unauthorized(&self) {
        warn!("Spotify catalog answered 401, clearing session");
        if let Err(e) = self.store.remove(GENERIC_TOKEN_KEY).await {
            warn!("Failed to clear generic auth token: {}", e);
        }
        self.invalidate_app_token().await;
        self.navigator.navigate(LOGIN_PATH);
    }

    async fn persist_user_credential(&self, response: &AuthorizationTokenResponse) -> Result<()> {
        let expires_at_ms = self.expires_at(response.expires_in);
        self.store
            .set(USER_ACCESS_TOKEN_KEY, &response.access_token)
            .await?;
        if let Some(ref refresh_token) = response.refresh_token {
            self.store
                .set(USER_REFRESH_TOKEN_KEY, refresh_token)
                .await?;
        }
        self.store
            .set(USER_TOKEN_EXPIRES_KEY, &expires_at_ms.to_string())
            .await?;
        Ok(())
    }

    fn expires_at(&self, expires_in_secs: u64) -> u64 {
        self.clock
            .now_ms()
            .saturating_add(expires_in_secs.saturating_mul(1000))
    }

    /// POST a grant to the token endpoint with HTTP Basic client auth.
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<AuthorizationTokenResponse> {
        let url = format!(
            "{}/api/token",
            self.config.accounts_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token request failed: HTTP {} - {}", status, body);
            return Err(SpotifyError::auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let token = response
            .json::<AuthorizationTokenResponse>()
            .await
            .map_err(|e| SpotifyError::auth(format!("malformed token response: {e}")))?;
        if token.access_token.is_empty() {
            warn!("Token endpoint answered without an access token");
            return Err(SpotifyError::auth(
                "malformed token response: empty access_token",
            ));
        }
        Ok(token)
    }

    #[cfg(test)]
    async fn app_token_expires_at(&self) -> Option<u64> {
        self.app_credential
            .read()
            .await
            .as_ref()
            .map(|credential| credential.expires_at_ms)
    }
}

fn random_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{harness, START_MS, STUB_CLIENT_ID, TOKEN_TTL_SECS};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_app_token_is_cached_until_expiry() {
        let h = harness().await;

        let first = h.credentials.app_token().await.unwrap();
        let first_expiry = h.credentials.app_token_expires_at().await.unwrap();
        let second = h.credentials.app_token().await.unwrap();
        assert_eq!(first, "app-token-1");
        assert_eq!(second, first);
        assert_eq!(h.stub.state.token_requests(), 1);

        // One millisecond before expiry the cache still answers
        h.clock
            .advance(Duration::from_secs(TOKEN_TTL_SECS) - Duration::from_millis(1));
        assert_eq!(h.credentials.app_token().await.unwrap(), "app-token-1");
        assert_eq!(h.stub.state.token_requests(), 1);

        h.clock.advance(Duration::from_millis(1));
        assert_eq!(h.credentials.app_token().await.unwrap(), "app-token-2");
        assert_eq!(h.stub.state.token_requests(), 2);
        let second_expiry = h.credentials.app_token_expires_at().await.unwrap();
        assert!(second_expiry > first_expiry);

        let grant = h.stub.state.last_grant.lock().unwrap().clone();
        assert_eq!(
            grant.get("grant_type").map(String::as_str),
            Some("client_credentials")
        );
    }

    #[tokio::test]
    async fn test_concurrent_app_token_requests_share_one_exchange() {
        let h = harness().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let credentials = h.credentials.clone();
                tokio::spawn(async move { credentials.app_token().await.unwrap() })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), "app-token-1");
        }
        assert_eq!(h.stub.state.token_requests(), 1);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_auth_error() {
        let h = harness().await;
        h.stub.state.reject_tokens.store(true, Ordering::SeqCst);

        let err = h.credentials.app_token().await.unwrap_err();
        assert!(matches!(err, SpotifyError::Auth { .. }));
        assert!(err.is_auth());

        // Nothing was cached, so the next call tries again
        h.stub.state.reject_tokens.store(false, Ordering::SeqCst);
        assert!(h.credentials.app_token().await.is_ok());
        assert_eq!(h.stub.state.token_requests(), 2);
    }

    #[tokio::test]
    async fn test_empty_access_token_is_never_cached() {
        let h = harness().await;
        h.stub.state.empty_tokens.store(true, Ordering::SeqCst);

        for _ in 0..2 {
            let err = h.credentials.app_token().await.unwrap_err();
            assert!(matches!(err, SpotifyError::Auth { .. }));
        }
        assert_eq!(h.stub.state.token_requests(), 2);
        assert_eq!(h.credentials.app_token_expires_at().await, None);

        h.stub.state.empty_tokens.store(false, Ordering::SeqCst);
        assert_eq!(h.credentials.app_token().await.unwrap(), "app-token-3");
    }

    #[tokio::test]
    async fn test_empty_code_exchange_keeps_store_untouched() {
        let h = harness().await;
        h.stub.state.empty_tokens.store(true, Ordering::SeqCst);

        let err = h
            .credentials
            .exchange_authorization_code("auth-code")
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(h.store.get(USER_ACCESS_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_exchange() {
        let h = harness().await;

        h.credentials.app_token().await.unwrap();
        h.credentials.invalidate_app_token().await;
        assert_eq!(h.credentials.app_token().await.unwrap(), "app-token-2");
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let h = harness().await;

        let request = h.credentials.authorization_url().unwrap();
        assert_eq!(request.state.len(), STATE_LENGTH);
        assert!(request.state.chars().all(|c| c.is_ascii_alphanumeric()));

        let url = url::Url::parse(&request.url).unwrap();
        assert_eq!(url.path(), "/authorize");
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], STUB_CLIENT_ID);
        assert_eq!(params["scope"], USER_SCOPES);
        assert_eq!(params["redirect_uri"], crate::config::DEFAULT_REDIRECT_URI);
        assert_eq!(params["state"], request.state);

        // Each request gets a fresh state
        let other = h.credentials.authorization_url().unwrap();
        assert_ne!(other.state, request.state);
    }

    #[tokio::test]
    async fn test_code_exchange_persists_user_credential() {
        let h = harness().await;

        let response = h
            .credentials
            .exchange_authorization_code("auth-code")
            .await
            .unwrap();
        assert_eq!(response.access_token, "user-token");
        assert_eq!(response.refresh_token.as_deref(), Some("refresh-token"));

        let expected_expiry = (START_MS + TOKEN_TTL_SECS * 1000).to_string();
        assert_eq!(
            h.store.get(USER_ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("user-token")
        );
        assert_eq!(
            h.store.get(USER_REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("refresh-token")
        );
        assert_eq!(
            h.store.get(USER_TOKEN_EXPIRES_KEY).await.unwrap(),
            Some(expected_expiry)
        );

        let grant = h.stub.state.last_grant.lock().unwrap().clone();
        assert_eq!(grant["grant_type"], "authorization_code");
        assert_eq!(grant["code"], "auth-code");

        assert_eq!(
            h.credentials.user_token().await.unwrap().as_deref(),
            Some("user-token")
        );
    }

    #[tokio::test]
    async fn test_failed_code_exchange_keeps_previous_session() {
        let h = harness().await;
        h.credentials
            .exchange_authorization_code("first")
            .await
            .unwrap();

        h.stub.state.reject_tokens.store(true, Ordering::SeqCst);
        let err = h
            .credentials
            .exchange_authorization_code("second")
            .await
            .unwrap_err();
        assert!(matches!(err, SpotifyError::Auth { .. }));

        assert_eq!(
            h.credentials.user_token().await.unwrap().as_deref(),
            Some("user-token")
        );
    }

    #[tokio::test]
    async fn test_user_token_absent_after_expiry() {
        let h = harness().await;
        assert_eq!(h.credentials.user_token().await.unwrap(), None);

        h.credentials
            .exchange_authorization_code("auth-code")
            .await
            .unwrap();
        assert!(h.credentials.user_token().await.unwrap().is_some());

        h.clock.advance(Duration::from_secs(TOKEN_TTL_SECS));
        assert_eq!(h.credentials.user_token().await.unwrap(), None);

        // The credential stays stored; it is only unusable
        assert!(h.store.get(USER_ACCESS_TOKEN_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_token_with_unreadable_expiry_is_absent() {
        let h = harness().await;
        h.store.set(USER_ACCESS_TOKEN_KEY, "user-token").await.unwrap();
        h.store.set(USER_TOKEN_EXPIRES_KEY, "soon").await.unwrap();

        assert_eq!(h.credentials.user_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_stored_user_token_is_absent() {
        let h = harness().await;
        h.store.set(USER_ACCESS_TOKEN_KEY, "").await.unwrap();
        h.store
            .set(USER_TOKEN_EXPIRES_KEY, "99999999999999")
            .await
            .unwrap();

        assert_eq!(h.credentials.user_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_user_token_keeps_refresh_token() {
        let h = harness().await;
        h.credentials
            .exchange_authorization_code("auth-code")
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(TOKEN_TTL_SECS + 1));
        assert_eq!(h.credentials.user_token().await.unwrap(), None);

        let token = h.credentials.refresh_user_token().await.unwrap();
        assert_eq!(token, "user-token-refreshed");
        assert_eq!(
            h.credentials.user_token().await.unwrap().as_deref(),
            Some("user-token-refreshed")
        );
        assert_eq!(
            h.store.get(USER_REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("refresh-token")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails() {
        let h = harness().await;

        let err = h.credentials.refresh_user_token().await.unwrap_err();
        assert!(matches!(err, SpotifyError::Auth { .. }));
        assert_eq!(h.stub.state.token_requests(), 0);
    }

    #[tokio::test]
    async fn test_clear_user_session() {
        let h = harness().await;
        h.credentials
            .exchange_authorization_code("auth-code")
            .await
            .unwrap();

        h.credentials.clear_user_session().await.unwrap();
        for key in [
            USER_ACCESS_TOKEN_KEY,
            USER_REFRESH_TOKEN_KEY,
            USER_TOKEN_EXPIRES_KEY,
        ] {
            assert_eq!(h.store.get(key).await.unwrap(), None);
        }
        assert_eq!(h.credentials.user_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_handle_unauthorized_clears_generic_token_and_navigates() {
        let h = harness().await;
        h.credentials.set_generic_auth_token("generic").await.unwrap();
        h.credentials.app_token().await.unwrap();

        h.credentials.handle_unauthorized().await;

        assert_eq!(h.credentials.generic_auth_token().await.unwrap(), None);
        assert_eq!(h.navigator.paths(), vec![LOGIN_PATH.to_string()]);
        assert_eq!(h.credentials.app_token().await.unwrap(), "app-token-2");
    }
}
