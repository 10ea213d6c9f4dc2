//! Session lifecycle: login, registration, Google OAuth, logout, refresh.
//!
//! There is no stored session state machine. A session is authenticated
//! exactly when the credential store holds an access token that has not
//! expired; everything else is anonymous.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::navigator::Navigator;
use super::token::{self, TokenError};
use super::CredentialStore;
use crate::api::{join_url, ApiError, ApiRequest, Transport};
use crate::models::{AuthPayload, CredentialRecord, Envelope, Registration, UserSnapshot};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh-token";
const GOOGLE_PATH: &str = "/auth/google";

/// Query parameter the OAuth callback carries the token in.
const CALLBACK_TOKEN_PARAM: &str = "token";

const LOGIN_FAILED: &str = "Login failed";
const REGISTER_FAILED: &str = "Registration failed";
const REFRESH_FAILED: &str = "Token refresh failed";

#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend refused the request; carries its message.
    #[error("{0}")]
    Rejected(String),

    #[error("Malformed response from server: {0}")]
    MalformedResponse(String),

    #[error("No authentication token received")]
    NoTokenReceived,

    #[error("Invalid authentication token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Could not save session: {0}")]
    Storage(String),

    #[error(transparent)]
    Request(#[from] ApiError),
}

/// Owns credential persistence and every transition between anonymous and
/// authenticated. Shared by all API clients through an `Arc`.
pub struct SessionManager {
    api_base_url: String,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    /// Serializes refresh attempts so concurrent 401s share one refresh.
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        api_base_url: &str,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            store,
            transport,
            navigator,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    // ===== Store access =====

    /// Current record. Store failures read as "no session".
    fn read_record(&self) -> Option<CredentialRecord> {
        match self.store.read() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Credential store unavailable, treating session as anonymous");
                None
            }
        }
    }

    fn persist(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        self.store.save(record).map_err(|e| {
            warn!(error = %e, "Failed to save credentials");
            AuthError::Storage(e.to_string())
        })
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credentials");
        }
    }

    /// Stored access token, whether or not it has expired.
    pub fn access_token(&self) -> Option<String> {
        self.read_record()
            .and_then(|r| r.access_token().map(str::to_string))
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_record()
            .and_then(|r| r.refresh_token().map(str::to_string))
    }

    // ===== Status =====

    /// An access token is stored and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.access_token()
            .map(|t| !token::is_expired(&t))
            .unwrap_or(false)
    }

    /// The signed-in user, only while authenticated.
    pub fn current_user(&self) -> Option<UserSnapshot> {
        let record = self.read_record()?;
        let access = record.access_token()?;
        if token::is_expired(access) {
            return None;
        }
        Some(record.user)
    }

    /// Expiry of the stored access token, if it carries an `exp` claim.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let access = self.access_token()?;
        let exp = token::decode(&access).ok()?.exp?;
        DateTime::from_timestamp_millis((exp * 1000.0) as i64)
    }

    /// Whether the admin console should be shown. The server still checks.
    pub fn is_admin(&self) -> bool {
        self.current_user().map(|u| u.is_admin()).unwrap_or(false)
    }

    // ===== Transitions =====

    pub async fn login(&self, username: &str, password: &str) -> Result<UserSnapshot, AuthError> {
        let body = json!({ "username": username, "password": password });
        let record = self.exchange(LOGIN_PATH, &body, LOGIN_FAILED).await?;
        self.persist(&record)?;
        info!(role = %record.user.role, "Logged in");
        Ok(record.user)
    }

    pub async fn register(&self, registration: &Registration) -> Result<UserSnapshot, AuthError> {
        let record = self
            .exchange(REGISTER_PATH, registration, REGISTER_FAILED)
            .await?;
        self.persist(&record)?;
        info!("Registered new account");
        Ok(record.user)
    }

    pub fn google_login_url(&self) -> String {
        join_url(&self.api_base_url, GOOGLE_PATH)
    }

    /// Drop the current session and hand the user to the OAuth provider.
    pub fn begin_google_login(&self) {
        self.clear_store();
        self.navigator.open_external(&self.google_login_url());
    }

    /// Finish an OAuth round trip using the token in `callback`'s query string.
    ///
    /// The token parameter is removed from `callback` before anything else,
    /// so calling this twice with the same URL fails the second time with
    /// `NoTokenReceived` and leaves the first call's session in place.
    pub fn complete_google_login(&self, callback: &mut Url) -> Result<UserSnapshot, AuthError> {
        let raw = take_query_param(callback, CALLBACK_TOKEN_PARAM)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::NoTokenReceived)?;

        let claims = token::decode(&raw).map_err(|e| {
            warn!(error = %e, "Rejected OAuth callback token");
            AuthError::InvalidToken(e)
        })?;
        if claims.is_expired_at(Utc::now().timestamp_millis()) {
            warn!("Rejected expired OAuth callback token");
            return Err(AuthError::InvalidToken(TokenError::Expired));
        }

        let user = UserSnapshot {
            full_name: claims.display_name().unwrap_or_default(),
            email: claims
                .email
                .clone()
                .filter(|e| !e.trim().is_empty())
                .or_else(|| claims.identity().map(str::to_string))
                .unwrap_or_default(),
            role: claims.role_or_default().to_string(),
        };
        let record = CredentialRecord {
            access_token: raw,
            refresh_token: String::new(),
            user,
        };
        self.persist(&record)?;
        info!(role = %record.user.role, "Logged in with Google");
        Ok(record.user)
    }

    pub fn logout(&self) {
        self.clear_store();
        info!("Logged out");
        self.navigator.redirect_to_login();
    }

    /// Session is unrecoverable: wipe it and send the user to log in again.
    fn force_logout(&self) {
        self.clear_store();
        self.navigator.redirect_to_login();
    }

    /// Recover from a 401 on a request that carried `rejected_token`.
    ///
    /// Returns the access token to retry with, or `None` after forcing a
    /// logout. Callers waiting on the gate reuse a token another caller
    /// already refreshed instead of refreshing again.
    pub async fn refresh_after_unauthorized(&self, rejected_token: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.read_record();
        if let Some(stored) = current.as_ref().and_then(|r| r.access_token()) {
            if Some(stored) != rejected_token {
                debug!("Access token already rotated, reusing it");
                return Some(stored.to_string());
            }
        }

        let Some(refresh_token) = current
            .as_ref()
            .and_then(|r| r.refresh_token())
            .map(str::to_string)
        else {
            warn!("No refresh token available, ending session");
            self.force_logout();
            return None;
        };

        let body = json!({ "refreshToken": refresh_token });
        match self.exchange(REFRESH_PATH, &body, REFRESH_FAILED).await {
            Ok(record) => {
                if self.persist(&record).is_err() {
                    self.force_logout();
                    return None;
                }
                info!("Access token refreshed");
                Some(record.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.force_logout();
                None
            }
        }
    }

    /// POST `body` to an auth endpoint and validate the envelope.
    async fn exchange<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<CredentialRecord, AuthError> {
        let request = ApiRequest::post(path, body)?;
        let response = self.transport.send(&self.api_base_url, &request).await?;
        let envelope = serde_json::from_str::<Envelope<AuthPayload>>(&response.body);

        if !response.status.is_success() {
            let message = envelope
                .as_ref()
                .ok()
                .and_then(|e| e.message())
                .unwrap_or(fallback);
            debug!(path = path, status = %response.status, "Auth request rejected");
            return Err(AuthError::Rejected(message.to_string()));
        }

        let envelope = envelope.map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        if !envelope.success {
            let message = envelope.message().unwrap_or(fallback).to_string();
            return Err(AuthError::Rejected(message));
        }

        envelope
            .data
            .and_then(AuthPayload::into_record)
            .ok_or_else(|| AuthError::MalformedResponse("missing access token".to_string()))
    }
}

/// Remove every `key` parameter from `url`'s query, returning the first value.
fn take_query_param(url: &mut Url, key: &str) -> Option<String> {
    let mut found = None;
    let mut kept = Vec::new();
    for (k, v) in url.query_pairs() {
        if k == key {
            if found.is_none() {
                found = Some(v.into_owned());
            }
        } else {
            kept.push((k.into_owned(), v.into_owned()));
        }
    }

    if found.is_some() {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    found
}
