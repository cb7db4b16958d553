//! Campus mock backend
//!
//! Small HTTP service the platform client runs against:
//! 1. Issues and renews bearer token pairs (`/auth/login`, `/auth/refresh`)
//! 2. Serves bearer-protected mock data (groups, repositories, rooms)
//! 3. Exposes `/health` and Prometheus `/metrics`

mod config;
mod data;
mod metrics;
mod routes;
mod sessions;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{AppState, SeedAccount, build_router};
use crate::sessions::SessionIssuer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting campus-mock-api");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        token_ttl_secs = config.server.token_ttl_secs,
        rotate_refresh_tokens = config.server.rotate_refresh_tokens,
        seed_email = %config.seed.email,
        "configuration loaded"
    );

    let issuer = Arc::new(SessionIssuer::new(
        Duration::from_secs(config.server.token_ttl_secs),
        config.server.rotate_refresh_tokens,
    ));

    let password = config
        .seed
        .password
        .context("seed password missing after config load")?;
    let account = Arc::new(SeedAccount {
        id: format!("usr_{}", uuid::Uuid::new_v4().as_simple()),
        name: config.seed.name,
        email: config.seed.email,
        role: config.seed.role,
        password,
    });

    let state = AppState {
        issuer,
        account,
        started_at: Instant::now(),
        prometheus,
    };

    let app = build_router(state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;

    use campus_auth::SessionStore;
    use campus_client::{ApiClient, ApiRequest};
    use campus_renewal::{NoopHooks, RenewalCoordinator};

    fn test_state(ttl: Duration, rotate: bool) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            issuer: Arc::new(SessionIssuer::new(ttl, rotate)),
            account: Arc::new(SeedAccount {
                id: "usr_1".into(),
                name: "Dana Vogel".into(),
                email: "dana@campus.test".into(),
                role: "student".into(),
                password: Secret::new("seed-pw".into()),
            }),
            started_at: Instant::now(),
            prometheus: recorder.handle(),
        }
    }

    /// Serve the real router on an ephemeral loopback port.
    async fn serve(state: AppState) -> String {
        let app = build_router(state, 64);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Wire the real client crates against the served router.
    fn wire(base_url: &str) -> (ApiClient, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::in_memory());
        let http = reqwest::Client::new();
        let coordinator = RenewalCoordinator::new(
            base_url,
            store.clone(),
            http.clone(),
            Arc::new(NoopHooks),
            Duration::from_secs(2),
        );
        let client = ApiClient::new(base_url, store.clone(), coordinator, http)
            .with_timeout(Duration::from_secs(2));
        (client, store)
    }

    #[tokio::test]
    async fn end_to_end_login_fetch_renew() {
        let state = test_state(Duration::from_secs(60), true);
        let issuer = state.issuer.clone();
        let base_url = serve(state).await;
        let (client, store) = wire(&base_url);

        let profile = client.login("dana@campus.test", "seed-pw").await.unwrap();
        assert_eq!(profile.email, "dana@campus.test");
        assert_eq!(client.current_role().await.as_deref(), Some("student"));

        let response = client.send(ApiRequest::get("/groups")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["groups"].is_array());

        // Revoke the live access token; the next call must renew and retry
        // transparently through the real /auth/refresh endpoint.
        let stale = store.access_token().await.unwrap();
        issuer.revoke_access(&stale).await;

        let response = client.send(ApiRequest::get("/rooms")).await.unwrap();
        assert_eq!(response.status(), 200);

        let renewed = store.access_token().await.unwrap();
        assert_ne!(renewed, stale, "renewal must have stored a fresh token");

        client.logout().await.unwrap();
        assert_eq!(store.access_token().await, None);
    }

    #[tokio::test]
    async fn end_to_end_renewal_works_without_rotation() {
        let state = test_state(Duration::from_secs(60), false);
        let issuer = state.issuer.clone();
        let base_url = serve(state).await;
        let (client, store) = wire(&base_url);

        client.login("dana@campus.test", "seed-pw").await.unwrap();
        let original_refresh = store.refresh_token().await.unwrap();

        let stale = store.access_token().await.unwrap();
        issuer.revoke_access(&stale).await;

        let response = client.send(ApiRequest::get("/repositories")).await.unwrap();
        assert_eq!(response.status(), 200);

        // No rotation: the stored refresh credential is unchanged
        assert_eq!(store.refresh_token().await.unwrap(), original_refresh);
    }

    #[tokio::test]
    async fn end_to_end_second_401_passes_through() {
        // Zero TTL: every token, including renewed ones, is expired on
        // arrival. The pipeline renews once, retries once, then hands the
        // 401 back.
        let state = test_state(Duration::ZERO, true);
        let base_url = serve(state).await;
        let (client, _store) = wire(&base_url);

        client.login("dana@campus.test", "seed-pw").await.unwrap();

        let response = client.send(ApiRequest::get("/groups")).await.unwrap();
        assert_eq!(
            response.status(),
            401,
            "a 401 that survives renewal must reach the caller, not loop"
        );
    }
}
