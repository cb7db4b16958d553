//! Single-flight credential renewal
//!
//! When several in-flight requests all hit 401 at once, exactly one renewal
//! call goes to the backend; everyone else queues for its outcome. Success
//! re-arms the session with the renewed pair; failure tears the session down
//! and signals the application exactly once.
//!
//! Renewal lifecycle:
//! 1. First caller while idle becomes the leader: flips the phase to
//!    `Renewing`, spawns the renewal task, and queues like everyone else
//! 2. Callers arriving while renewing queue behind the in-flight call
//! 3. The renewal task settles, persists or clears credentials, then resets
//!    the phase and takes the whole queue in one critical section
//! 4. Every queued caller resolves with the same outcome; on failure,
//!    `SessionHooks::on_session_expired` fires once

pub mod coordinator;
pub mod error;
pub mod hooks;

pub use coordinator::{DEFAULT_RENEWAL_TIMEOUT, RenewalCoordinator};
pub use error::{Error, Result};
pub use hooks::{NoopHooks, SessionHooks};
