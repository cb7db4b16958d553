//! Session and credential handling for the Campus client
//!
//! Provides the storage seam session state is persisted through, the typed
//! session store that keeps the credential pair consistent, and the wire
//! calls to the platform auth endpoints. This crate is a standalone library
//! with no dependency on the renewal coordinator or the request pipeline —
//! it can be tested and used independently.
//!
//! Session flow:
//! 1. Application wires a backend (`MemoryBackend` or `FileBackend`)
//! 2. Login calls `token::login()` and persists via `SessionStore::store_login()`
//! 3. Every request reads the bearer via `SessionStore::access_token()`
//! 4. Renewal calls `token::refresh()` and persists via `SessionStore::store_credentials()`
//! 5. Sign-out or failed renewal tears down via `SessionStore::clear()`

pub mod constants;
pub mod error;
pub mod session;
pub mod storage;
pub mod token;

pub use constants::is_auth_endpoint;
pub use error::{Error, Result};
pub use session::{CredentialPair, SessionStore, UserProfile};
pub use storage::{FileBackend, MemoryBackend, StorageBackend};
pub use token::{LoginResponse, RefreshResponse, login, refresh};
