//! Shared plumbing for the Campus workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
