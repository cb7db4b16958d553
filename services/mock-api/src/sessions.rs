//! Token issuance and session tracking
//!
//! Tokens are opaque random strings, never parsed by the client. Access
//! tokens expire after a configurable TTL; refresh tokens live until they
//! are rotated away or the process exits. With rotation enabled, a refresh
//! exchange invalidates the presented refresh token and mints a replacement;
//! with rotation disabled, the same refresh token stays valid and the
//! exchange response carries no replacement.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens minted at login.
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of a refresh exchange. `refresh_token` is `Some` only when the
/// issuer rotates refresh tokens.
pub struct RenewedSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub subject: String,
}

struct AccessGrant {
    subject: String,
    expires_at: Instant,
}

#[derive(Default)]
struct IssuerState {
    /// Access token -> grant. Expired entries are dropped lazily on issue.
    access: HashMap<String, AccessGrant>,
    /// Refresh token -> subject.
    refresh: HashMap<String, String>,
}

/// Mints and validates the token pairs the auth endpoints hand out.
pub struct SessionIssuer {
    ttl: Duration,
    rotate: bool,
    state: Mutex<IssuerState>,
}

impl SessionIssuer {
    pub fn new(ttl: Duration, rotate: bool) -> Self {
        Self {
            ttl,
            rotate,
            state: Mutex::new(IssuerState::default()),
        }
    }

    /// Mint a fresh access/refresh pair for `subject` at login.
    pub async fn issue(&self, subject: &str) -> IssuedSession {
        let access_token = mint("at_");
        let refresh_token = mint("rt_");

        let mut state = self.state.lock().await;
        // Lazy cleanup: drop expired grants while holding the lock
        let now = Instant::now();
        state.access.retain(|_, grant| grant.expires_at > now);

        state.access.insert(
            access_token.clone(),
            AccessGrant {
                subject: subject.to_string(),
                expires_at: now + self.ttl,
            },
        );
        state
            .refresh
            .insert(refresh_token.clone(), subject.to_string());

        info!(subject, "session issued");
        IssuedSession {
            access_token,
            refresh_token,
        }
    }

    /// Resolve an access token to its subject, if it is known and unexpired.
    pub async fn authenticate(&self, access_token: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .access
            .get(access_token)
            .filter(|grant| grant.expires_at > Instant::now())
            .map(|grant| grant.subject.clone())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Unknown (or already rotated-away) refresh tokens exchange to `None`.
    pub async fn exchange(&self, refresh_token: &str) -> Option<RenewedSession> {
        let mut state = self.state.lock().await;

        let subject = if self.rotate {
            state.refresh.remove(refresh_token)?
        } else {
            state.refresh.get(refresh_token)?.clone()
        };

        let access_token = mint("at_");
        state.access.insert(
            access_token.clone(),
            AccessGrant {
                subject: subject.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        let new_refresh = if self.rotate {
            let token = mint("rt_");
            state.refresh.insert(token.clone(), subject.clone());
            Some(token)
        } else {
            None
        };

        debug!(subject, rotated = new_refresh.is_some(), "refresh exchanged");
        Some(RenewedSession {
            access_token,
            refresh_token: new_refresh,
            subject,
        })
    }

    /// Invalidate one access token immediately. Lets tests force the 401
    /// path on a live session without waiting out the TTL.
    pub async fn revoke_access(&self, access_token: &str) {
        self.state.lock().await.access.remove(access_token);
    }

    /// Number of unexpired access grants, for the health endpoint.
    pub async fn active_sessions(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .await
            .access
            .values()
            .filter(|grant| grant.expires_at > now)
            .count()
    }
}

/// Opaque token: 32 random bytes as URL-safe base64, behind a readable prefix.
fn mint(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    format!("{prefix}{}", URL_SAFE_NO_PAD.encode(bytes))
}
