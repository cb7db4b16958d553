//! Router and handlers for the mock backend
//!
//! Auth endpoints mint and exchange tokens through the issuer; everything
//! else checks the bearer token and serves canned data. Failures use one
//! JSON envelope: `{"error": {"type", "message", "request_id"}}`.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::data;
use crate::metrics;
use crate::sessions::SessionIssuer;

/// The single account the mock backend can authenticate.
pub struct SeedAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: Secret<String>,
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<SessionIssuer>,
    pub account: Arc<SeedAccount>,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/users/me", get(me_handler))
        .route("/groups", get(groups_handler))
        .route("/repositories", get(repositories_handler))
        .route("/rooms", get(rooms_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Count every completed request with method and status labels.
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16());
    response
}

/// JSON error envelope with a fresh request ID, logged for correlation.
fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    warn!(request_id, kind, message, status = status.as_u16(), "request failed");
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "error": {
                "type": kind,
                "message": message,
                "request_id": request_id,
            }
        })
        .to_string(),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

/// POST /auth/login — check the seeded account, issue a token pair.
async fn login_handler(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<LoginBody>,
) -> Response {
    let account = &state.account;
    if body.email != account.email || body.password != *account.password.expose() {
        metrics::record_login("failure");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "email or password is incorrect",
        );
    }

    let session = state.issuer.issue(&account.email).await;
    metrics::record_login("success");
    info!(email = %account.email, "login succeeded");

    axum::Json(json!({
        "accessToken": session.access_token,
        "refreshToken": session.refresh_token,
        "user": {
            "id": account.id,
            "name": account.name,
            "email": account.email,
        },
        "role": account.role,
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

/// POST /auth/refresh — exchange a refresh token for a new access token.
///
/// With rotation enabled the response carries a replacement refresh token;
/// with rotation disabled the `refreshToken` field is omitted entirely.
async fn refresh_handler(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<RefreshBody>,
) -> Response {
    match state.issuer.exchange(&body.refresh_token).await {
        Some(renewed) => {
            metrics::record_refresh("success");
            let mut payload = json!({ "accessToken": renewed.access_token });
            if let Some(refresh) = renewed.refresh_token {
                payload["refreshToken"] = json!(refresh);
            }
            axum::Json(payload).into_response()
        }
        None => {
            metrics::record_refresh("failure");
            error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "refresh token is unknown or has been rotated",
            )
        }
    }
}

/// Resolve the bearer token or produce the 401 envelope.
async fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing bearer token",
        ));
    };

    match state.issuer.authenticate(token).await {
        Some(subject) => Ok(subject),
        None => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "access token is expired or unknown",
        )),
    }
}

/// GET /users/me — profile of the authenticated account.
async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_bearer(&state, &headers).await {
        return denied;
    }
    let account = &state.account;
    axum::Json(json!({
        "id": account.id,
        "name": account.name,
        "email": account.email,
        "role": account.role,
    }))
    .into_response()
}

/// GET /groups
async fn groups_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match require_bearer(&state, &headers).await {
        Ok(_) => axum::Json(data::groups()).into_response(),
        Err(denied) => denied,
    }
}

/// GET /repositories
async fn repositories_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match require_bearer(&state, &headers).await {
        Ok(_) => axum::Json(data::repositories()).into_response(),
        Err(denied) => denied,
    }
}

/// GET /rooms
async fn rooms_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match require_bearer(&state, &headers).await {
        Ok(_) => axum::Json(data::rooms()).into_response(),
        Err(denied) => denied,
    }
}

/// GET /health — status, uptime, active session count. Unauthenticated.
async fn health_handler(State(state): State<AppState>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    let active = state.issuer.active_sessions().await;
    axum::Json(json!({
        "status": "healthy",
        "uptime_seconds": uptime,
        "active_sessions": active,
    }))
    .into_response()
}

/// GET /metrics — Prometheus text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
