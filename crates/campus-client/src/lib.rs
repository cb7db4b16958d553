//! Authenticated API client for the Campus platform
//!
//! The request pipeline every platform call goes through: attach the bearer
//! credential on the way out, classify 401s on the way back, renew the
//! credential at most once through the shared coordinator, and resubmit the
//! original request. Callers never see a renewable 401 and never trigger a
//! renewal stampede.
//!
//! Wiring order at the composition root:
//! 1. Build one `reqwest::Client` and one `SessionStore`
//! 2. Build the `RenewalCoordinator` over both, with the application's
//!    `SessionHooks`
//! 3. Build `ApiClient` over the same store and coordinator
//! 4. `login()` once, then `send()` everywhere; `logout()` tears down

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{Error, Result};
pub use request::ApiRequest;
