//! Typed session store over the injected storage backend
//!
//! Four keys make up a stored session: the access credential, the refresh
//! credential, the cached profile, and the role. Multi-key operations run
//! under one transaction mutex so a concurrent reader sees the old pair or
//! the new pair, never a mix of both.
//!
//! The store is written by the renewal coordinator and the login/logout
//! flows, and read by the request pipeline on every outbound call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::constants::{KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_ROLE, KEY_USER};
use crate::error::{Error, Result};
use crate::storage::{MemoryBackend, StorageBackend};

/// Access/refresh credential pair. Opaque bearer strings the client never
/// parses. Both are stored together or not at all.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for CredentialPair {
    // Token material must not reach logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Profile cached at login time so the application can restore a session
/// without a network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Thread-safe typed adapter over the key-value backend.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    /// Serializes multi-key operations against single-key reads.
    guard: Mutex<()>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            guard: Mutex::new(()),
        }
    }

    /// Store backed by ephemeral in-process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Current access credential. Empty or unreadable values read as absent;
    /// the backend is authoritative about nothing — the server decides.
    pub async fn access_token(&self) -> Option<String> {
        let _guard = self.guard.lock().await;
        self.read_nonempty(KEY_ACCESS_TOKEN).await
    }

    /// Current refresh credential, if one is stored.
    pub async fn refresh_token(&self) -> Option<String> {
        let _guard = self.guard.lock().await;
        self.read_nonempty(KEY_REFRESH_TOKEN).await
    }

    /// Both credentials, or `None` unless both are present.
    pub async fn credentials(&self) -> Option<CredentialPair> {
        let _guard = self.guard.lock().await;
        let access = self.read_nonempty(KEY_ACCESS_TOKEN).await?;
        let refresh = self.read_nonempty(KEY_REFRESH_TOKEN).await?;
        Some(CredentialPair { access, refresh })
    }

    /// Write the credential pair, all-or-nothing.
    pub async fn store_credentials(&self, pair: &CredentialPair) -> Result<()> {
        let _guard = self.guard.lock().await;
        self.write_pair(pair).await
    }

    /// Write the full session at login: credentials, profile, role.
    pub async fn store_login(
        &self,
        pair: &CredentialPair,
        user: &UserProfile,
        role: &str,
    ) -> Result<()> {
        let _guard = self.guard.lock().await;
        self.write_pair(pair).await?;
        let profile = serde_json::to_string(user)
            .map_err(|e| Error::Storage(format!("serializing profile: {e}")))?;
        self.backend.set(KEY_USER, &profile).await?;
        self.backend.set(KEY_ROLE, role).await?;
        Ok(())
    }

    /// Cached profile, if one is stored and parseable.
    pub async fn user(&self) -> Option<UserProfile> {
        let _guard = self.guard.lock().await;
        let raw = self.read_nonempty(KEY_USER).await?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "stored profile is not parseable, treating as absent");
                None
            }
        }
    }

    /// Cached role, if one is stored.
    pub async fn role(&self) -> Option<String> {
        let _guard = self.guard.lock().await;
        self.read_nonempty(KEY_ROLE).await
    }

    /// Remove every session key. Used on sign-out and on failed renewal.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.guard.lock().await;
        for key in [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER, KEY_ROLE] {
            self.backend.remove(key).await?;
        }
        Ok(())
    }

    /// Pair write with rollback: if the refresh write fails after the access
    /// write succeeded, the access key is removed again so no access
    /// credential ever persists without its refresh counterpart.
    async fn write_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.backend.set(KEY_ACCESS_TOKEN, &pair.access).await?;
        if let Err(e) = self.backend.set(KEY_REFRESH_TOKEN, &pair.refresh).await {
            if let Err(rollback) = self.backend.remove(KEY_ACCESS_TOKEN).await {
                warn!(error = %rollback, "failed to roll back half-written credential pair");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn read_nonempty(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(key, error = %e, "storage read failed, treating as absent");
                None
            }
        }
    }
}
