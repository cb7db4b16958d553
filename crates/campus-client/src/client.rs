//! The authenticated request pipeline
//!
//! `send` attaches the stored bearer credential, dispatches, and reacts to
//! exactly one 401 per request: renew through the shared coordinator, then
//! resubmit the original request with the credential the coordinator handed
//! back. 401s from the auth endpoints themselves and 401s on an already
//! retried request pass through unchanged.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::debug;

use campus_auth::{CredentialPair, SessionStore, UserProfile, is_auth_endpoint, token};
use campus_renewal::RenewalCoordinator;

use crate::error::{Error, Result};
use crate::request::ApiRequest;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for the platform backend.
///
/// Cheap to clone; clones share the session store and the renewal
/// coordinator, so concurrent 401s across clones still collapse into a
/// single renewal.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    coordinator: RenewalCoordinator,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<SessionStore>,
        coordinator: RenewalCoordinator,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
            coordinator,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request through the authenticated pipeline.
    ///
    /// The response comes back unchanged unless it is the first 401 of an
    /// unretried request to a non-auth path; that one case triggers a
    /// credential renewal and a single resubmit. A failed renewal surfaces
    /// as [`Error::Renewal`] after the coordinator has already torn the
    /// session down and signalled the application.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response> {
        let bearer = self.store.access_token().await;
        let response = self.dispatch(&request, bearer.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || is_auth_endpoint(&request.path)
            || request.retried
        {
            return Ok(response);
        }

        debug!(path = %request.path, "401 on authenticated path, renewing credential");
        request.retried = true;
        let fresh = self.coordinator.fresh_access_token().await?;
        self.dispatch(&request, Some(&fresh)).await
    }

    /// Sign in and persist the full session (credentials, profile, role).
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let session =
            token::login(&self.http, &self.base_url, email, password, self.timeout).await?;
        let pair = CredentialPair {
            access: session.access_token,
            refresh: session.refresh_token,
        };
        self.store
            .store_login(&pair, &session.user, &session.role)
            .await?;
        debug!(user_id = %session.user.id, role = %session.role, "signed in");
        Ok(session.user)
    }

    /// Sign out: clear every stored session key.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        debug!("signed out, session cleared");
        Ok(())
    }

    /// Profile cached at login, for session restore without a network call.
    pub async fn current_user(&self) -> Option<UserProfile> {
        self.store.user().await
    }

    /// Role cached at login.
    pub async fn current_role(&self) -> Option<String> {
        self.store.role().await
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .timeout(self.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{} {} timed out: {e}", request.method, request.path))
            } else {
                Error::Http(format!("{} {} failed: {e}", request.method, request.path))
            }
        })
    }
}
