//! Login and credential renewal wire calls
//!
//! Both endpoints take and return JSON. Renewal POSTs the refresh credential
//! to `/auth/refresh`; the response carries a new access credential and,
//! only when the server rotates, a replacement refresh credential. A missing
//! `refreshToken` field means the old refresh credential stays valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGIN_PATH, REFRESH_PATH};
use crate::error::{Error, Result};
use crate::session::UserProfile;

/// Body of `POST /auth/refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Renewal endpoint response.
///
/// `refresh_token` is present only when the server rotates refresh
/// credentials; the caller keeps the previous one otherwise.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login endpoint response: a full session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
    pub role: String,
}

/// Exchange a refresh credential for a new access credential.
///
/// Any non-2xx response is a renewal failure; the caller decides what that
/// means for the session. Timeouts are classified separately from other
/// transport errors.
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
    timeout: Duration,
) -> Result<RefreshResponse> {
    let response = client
        .post(endpoint(base_url, REFRESH_PATH))
        .timeout(timeout)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(classify_transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected(format!(
            "renewal endpoint returned {status}: {body}"
        )));
    }

    let renewed = response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid renewal response: {e}")))?;
    debug!(rotated = renewed.refresh_token.is_some(), "credential renewed");
    Ok(renewed)
}

/// Authenticate with email and password.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
    timeout: Duration,
) -> Result<LoginResponse> {
    let response = client
        .post(endpoint(base_url, LOGIN_PATH))
        .timeout(timeout)
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(classify_transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected(format!(
            "login endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid login response: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn classify_transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("auth request timed out: {e}"))
    } else {
        Error::Http(format!("auth request failed: {e}"))
    }
}
