//! Test doubles shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::token::encode_for_test;
use crate::auth::Navigator;
use crate::models::{CredentialRecord, UserSnapshot};

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Transport answering from a closure and recording every request it sees.
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _base_url: &str, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().expect("requests lock").push(request.clone());
        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Login,
    External(String),
}

#[derive(Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<Navigation> {
        self.events.lock().expect("events lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.events.lock().expect("events lock").push(Navigation::Login);
    }

    fn open_external(&self, url: &str) {
        self.events
            .lock()
            .expect("events lock")
            .push(Navigation::External(url.to_string()));
    }
}

/// A token that expires an hour from now.
pub fn live_token(sub: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode_for_test(&json!({ "sub": sub, "exp": exp }))
}

pub fn record(access_token: &str, refresh_token: &str) -> CredentialRecord {
    CredentialRecord {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        user: UserSnapshot {
            full_name: "Alice Doe".to_string(),
            email: "alice@example.com".to_string(),
            role: "user".to_string(),
        },
    }
}

/// Successful auth envelope carrying the given tokens.
pub fn auth_success(access_token: &str, refresh_token: &str) -> Result<ApiResponse, ApiError> {
    let body = json!({
        "success": true,
        "message": "ok",
        "data": {
            "accessToken": access_token,
            "refreshToken": refresh_token,
            "fullName": "Alice Doe",
            "email": "alice@example.com",
            "role": "user"
        }
    });
    Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
}

pub fn auth_failure(status: StatusCode, message: &str) -> Result<ApiResponse, ApiError> {
    let body = json!({ "success": false, "message": message });
    Ok(ApiResponse::new(status, body.to_string()))
}

pub fn status(status: StatusCode) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(status, "{}"))
}
