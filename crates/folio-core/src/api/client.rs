//! Authenticated API client.
//!
//! Every call to the backend goes through `ApiClient::send`, which attaches
//! the stored bearer token and, on a 401, refreshes the session once and
//! resubmits the request. Sub-APIs (for example the profile service) get a
//! `scoped` client that shares the same pipeline.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::transport::{join_url, ApiRequest, ApiResponse, Transport};
use super::ApiError;
use crate::auth::SessionManager;

/// API client bound to one base URL.
/// Clone is cheap - the session and transport are shared.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ApiClient {
    /// Client for the session's API base URL, using the session's transport.
    pub fn new(session: Arc<SessionManager>) -> Self {
        let transport = session.transport();
        let base_url = session.api_base_url().to_string();
        Self {
            session,
            transport,
            base_url,
        }
    }

    /// Client for a sub-path of this one, e.g. `scoped("/profile")`.
    pub fn scoped(&self, prefix: &str) -> Self {
        Self {
            session: Arc::clone(&self.session),
            transport: Arc::clone(&self.transport),
            base_url: join_url(&self.base_url, prefix),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send `request`, refreshing the session at most once if it is rejected.
    ///
    /// The caller always gets a response back: the retried one after a
    /// successful refresh, otherwise the original 401.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        // Sent as-is even if expired; the server decides
        let sent_token = self.session.access_token();
        if let Some(ref token) = sent_token {
            request.set_bearer(token)?;
        }

        let response = self.transport.send(&self.base_url, &request).await?;
        if !response.is_unauthorized() || request.is_retry() {
            return Ok(response);
        }

        request.mark_retry();
        debug!(path = %request.path, "Request unauthorized, refreshing session");

        match self
            .session
            .refresh_after_unauthorized(sent_token.as_deref())
            .await
        {
            Some(fresh) => {
                request.set_bearer(&fresh)?;
                let retried = self.transport.send(&self.base_url, &request).await?;
                if retried.is_unauthorized() {
                    warn!(path = %request.path, "Request still unauthorized after refresh");
                }
                Ok(retried)
            }
            None => Ok(response),
        }
    }

    /// Map a non-2xx response to an `ApiError`.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = Self::check_response(self.send(request).await?)?;
        response.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request_json(ApiRequest::post(path, body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request_json(ApiRequest::put(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        Self::check_response(self.send(ApiRequest::delete(path)).await?)?;
        Ok(())
    }
}
