//! Collaborator seam for session teardown
//!
//! The coordinator signals the surrounding application through this trait
//! instead of letting a failure escape into UI code. One call per failed
//! renewal, fired after stored credentials are cleared and waiters rejected.

/// Application-side reactions to session lifecycle events.
pub trait SessionHooks: Send + Sync {
    /// The session is gone: credentials cleared, every waiter rejected.
    /// The application should route the user back to sign-in.
    fn on_session_expired(&self);
}

/// Hooks that ignore every signal, for contexts with no interactive session
/// to tear down.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {
    fn on_session_expired(&self) {}
}
