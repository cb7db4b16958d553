//! The single-flight renewal coordinator
//!
//! One instance per session, created by the composition root and shared by
//! clone. The phase flip and the enqueue-vs-lead decision happen under one
//! mutex guard, so two callers racing on different worker threads can never
//! both start a renewal. The guard is never held across the network call.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use campus_auth::{CredentialPair, SessionStore, token};

use crate::error::{Error, Result};
use crate::hooks::SessionHooks;

/// Default bound on the renewal network call. A stalled renewal endpoint
/// must not strand the waiter queue.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Continuation for a caller waiting on the in-flight renewal.
type Waiter = oneshot::Sender<Result<String>>;

/// Renewal lifecycle. `waiters` is non-empty only while `Renewing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Renewing,
}

struct Flight {
    phase: Phase,
    waiters: VecDeque<Waiter>,
}

/// Single-flight credential renewal.
///
/// Cheap to clone; all clones share one flight state. The request pipeline
/// calls [`RenewalCoordinator::fresh_access_token`] on the first 401 of any
/// request and retries with whatever comes back.
#[derive(Clone)]
pub struct RenewalCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    flight: Mutex<Flight>,
    store: Arc<SessionStore>,
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    hooks: Arc<dyn SessionHooks>,
}

impl RenewalCoordinator {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<SessionStore>,
        http: reqwest::Client,
        hooks: Arc<dyn SessionHooks>,
        renewal_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                flight: Mutex::new(Flight {
                    phase: Phase::Idle,
                    waiters: VecDeque::new(),
                }),
                store,
                http,
                base_url: base_url.into(),
                timeout: renewal_timeout,
                hooks,
            }),
        }
    }

    /// Hand back a fresh access credential, renewing at most once.
    ///
    /// The first caller while idle becomes the leader and starts the
    /// renewal; everyone else queues for the same outcome. The renewal
    /// itself runs as a detached task, so a caller that gives up and drops
    /// this future cannot strand the queue.
    pub async fn fresh_access_token(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut flight = self.shared.flight.lock().await;
            flight.waiters.push_back(tx);
            match flight.phase {
                Phase::Renewing => false,
                Phase::Idle => {
                    flight.phase = Phase::Renewing;
                    true
                }
            }
        };

        if lead {
            debug!("starting credential renewal");
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { shared.run_renewal().await });
        } else {
            debug!("renewal already in flight, queueing");
        }

        match rx.await {
            Ok(outcome) => outcome,
            // The renewal task resolves every waiter before it exits; a
            // dropped sender means the task itself died.
            Err(_) => Err(Error::Internal("renewal task dropped its waiters".into())),
        }
    }
}

impl Shared {
    /// Run to completion regardless of caller cancellation: settle the
    /// renewal, update storage, then reset the phase and take the whole
    /// queue in one critical section so late arrivals either land in the
    /// drained batch or start a fresh flight, never in between.
    async fn run_renewal(self: Arc<Self>) {
        let outcome = self.renew().await;

        match &outcome {
            Ok(_) => {
                metrics::counter!("session_renewals_total", "outcome" => "success").increment(1);
                info!("credential renewal succeeded");
            }
            Err(e) => {
                metrics::counter!("session_renewals_total", "outcome" => "failure").increment(1);
                warn!(error = %e, "credential renewal failed, tearing down session");
                if let Err(clear_err) = self.store.clear().await {
                    warn!(error = %clear_err, "failed to clear session state");
                }
            }
        }

        let waiters = {
            let mut flight = self.flight.lock().await;
            flight.phase = Phase::Idle;
            std::mem::take(&mut flight.waiters)
        };

        debug!(waiters = waiters.len(), "draining renewal waiters");
        for waiter in waiters {
            // A waiter that gave up is fine to skip
            let _ = waiter.send(outcome.clone());
        }

        if outcome.is_err() {
            self.hooks.on_session_expired();
        }
    }

    /// One renewal attempt: read the refresh credential, call the renewal
    /// endpoint, persist the new pair. The previous refresh credential is
    /// kept when the server does not rotate. A pair that cannot be
    /// persisted counts as a failed renewal.
    async fn renew(&self) -> Result<String> {
        let refresh = self
            .store
            .refresh_token()
            .await
            .ok_or(Error::NoRefreshCredential)?;

        let renewed = token::refresh(&self.http, &self.base_url, &refresh, self.timeout).await?;

        let pair = CredentialPair {
            access: renewed.access_token,
            refresh: renewed.refresh_token.unwrap_or(refresh),
        };
        self.store
            .store_credentials(&pair)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(pair.access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    use campus_auth::{MemoryBackend, StorageBackend, UserProfile};

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Hooks that count session-expired signals.
    #[derive(Default)]
    struct CountingHooks {
        expired: AtomicUsize,
    }

    impl SessionHooks for CountingHooks {
        fn on_session_expired(&self) {
            self.expired.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Serve a router on an ephemeral loopback port, returning its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Renewal endpoint that counts calls and answers after a short delay,
    /// long enough for every concurrent caller to have queued.
    fn renewal_server(calls: Arc<AtomicUsize>, rotate: bool) -> Router {
        Router::new().route(
            "/auth/refresh",
            post(move || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    let mut body = serde_json::json!({ "accessToken": format!("at_renewed_{n}") });
                    if rotate {
                        body["refreshToken"] = serde_json::json!(format!("rt_next_{n}"));
                    }
                    axum::Json(body)
                }
            }),
        )
    }

    /// Store seeded with a full session (stale access credential).
    async fn seeded_store() -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::in_memory());
        store
            .store_login(
                &CredentialPair {
                    access: "at_stale".into(),
                    refresh: "rt_old".into(),
                },
                &UserProfile {
                    id: "usr_1".into(),
                    name: "Dana Vogel".into(),
                    email: "dana@campus.test".into(),
                },
                "student",
            )
            .await
            .unwrap();
        store
    }

    fn coordinator(
        base_url: &str,
        store: Arc<SessionStore>,
        hooks: Arc<CountingHooks>,
    ) -> RenewalCoordinator {
        RenewalCoordinator::new(base_url, store, reqwest::Client::new(), hooks, TIMEOUT)
    }

    async fn assert_session_cleared(store: &SessionStore) {
        assert_eq!(store.access_token().await, None);
        assert_eq!(store.refresh_token().await, None);
        assert_eq!(store.user().await, None);
        assert_eq!(store.role().await, None);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_renewal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), true)).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks.clone());

        let mut handles = vec![];
        for _ in 0..5 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.fresh_access_token().await },
            ));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "at_renewed_1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "renewal must be single-flight");
        let pair = store.credentials().await.unwrap();
        assert_eq!(pair.access, "at_renewed_1");
        assert_eq!(pair.refresh, "rt_next_1");
        assert_eq!(hooks.expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinator_is_reusable_after_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), true)).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks.clone());

        assert_eq!(coordinator.fresh_access_token().await.unwrap(), "at_renewed_1");
        assert_eq!(coordinator.fresh_access_token().await.unwrap(), "at_renewed_2");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.refresh_token().await.as_deref(), Some("rt_next_2"));
    }

    #[tokio::test]
    async fn rotation_is_optional() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), false)).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks);

        coordinator.fresh_access_token().await.unwrap();

        // New access credential, previous refresh credential kept
        let pair = store.credentials().await.unwrap();
        assert_eq!(pair.access, "at_renewed_1");
        assert_eq!(pair.refresh, "rt_old");
    }

    #[tokio::test]
    async fn rejected_renewal_fails_all_waiters_and_clears_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/auth/refresh",
            post({
                let calls = calls.clone();
                move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        (StatusCode::UNAUTHORIZED, "refresh token revoked")
                    }
                }
            }),
        );
        let base_url = serve(app).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks.clone());

        let mut handles = vec![];
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.fresh_access_token().await },
            ));
        }

        let mut messages = vec![];
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Rejected(_)), "got: {err:?}");
            messages.push(err.to_string());
        }

        // Same failure fanned out to every waiter
        assert!(messages.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_session_cleared(&store).await;
        assert_eq!(
            hooks.expired.load(Ordering::SeqCst),
            1,
            "session-expired must fire exactly once, not once per waiter"
        );
    }

    #[tokio::test]
    async fn timed_out_renewal_fails_waiters_and_clears_session() {
        let app = Router::new().route(
            "/auth/refresh",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        );
        let base_url = serve(app).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = RenewalCoordinator::new(
            &base_url,
            store.clone(),
            reqwest::Client::new(),
            hooks.clone(),
            Duration::from_millis(100),
        );

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.fresh_access_token().await })
        };
        let second = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.fresh_access_token().await })
        };

        for handle in [first, second] {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Timeout(_)), "got: {err:?}");
        }

        assert_session_cleared(&store).await;
        assert_eq!(hooks.expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_refresh_credential_fails_without_network() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), true)).await;
        let store = Arc::new(SessionStore::in_memory());
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks.clone());

        let err = coordinator.fresh_access_token().await.unwrap_err();
        assert!(matches!(err, Error::NoRefreshCredential), "got: {err:?}");

        assert_eq!(calls.load(Ordering::SeqCst), 0, "no renewal call expected");
        assert_eq!(hooks.expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_strand_followers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), true)).await;
        let store = seeded_store().await;
        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks);

        // Leader starts the renewal, then its caller gives up
        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.fresh_access_token().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        leader.abort();

        // A follower queued behind the same flight still resolves
        let outcome = coordinator.fresh_access_token().await.unwrap();
        assert_eq!(outcome, "at_renewed_1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Backend whose writes always fail, to exercise the persist-failure path.
    struct ReadOnlyBackend {
        inner: MemoryBackend,
    }

    impl StorageBackend for ReadOnlyBackend {
        fn get<'a>(
            &'a self,
            key: &'a str,
        ) -> Pin<Box<dyn Future<Output = campus_auth::Result<Option<String>>> + Send + 'a>>
        {
            self.inner.get(key)
        }

        fn set<'a>(
            &'a self,
            _key: &'a str,
            _value: &'a str,
        ) -> Pin<Box<dyn Future<Output = campus_auth::Result<()>> + Send + 'a>> {
            Box::pin(async { Err(campus_auth::Error::Storage("read-only backend".into())) })
        }

        fn remove<'a>(
            &'a self,
            key: &'a str,
        ) -> Pin<Box<dyn Future<Output = campus_auth::Result<()>> + Send + 'a>> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn unpersistable_renewal_counts_as_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(renewal_server(calls.clone(), true)).await;

        let inner = MemoryBackend::new();
        inner.set("token", "at_stale").await.unwrap();
        inner.set("refresh_token", "rt_old").await.unwrap();
        let store = Arc::new(SessionStore::new(Arc::new(ReadOnlyBackend { inner })));

        let hooks = Arc::new(CountingHooks::default());
        let coordinator = coordinator(&base_url, store.clone(), hooks.clone());

        let err = coordinator.fresh_access_token().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "got: {err:?}");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.expired.load(Ordering::SeqCst), 1);
        // Teardown removed what the read-only backend still held
        assert_eq!(store.access_token().await, None);
        assert_eq!(store.refresh_token().await, None);
    }
}
