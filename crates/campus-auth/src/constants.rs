//! Auth endpoint paths and session storage keys

/// Login endpoint (POST, email + password)
pub const LOGIN_PATH: &str = "/auth/login";

/// Credential renewal endpoint (POST, refresh credential)
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Storage key for the access credential
pub const KEY_ACCESS_TOKEN: &str = "token";

/// Storage key for the refresh credential
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";

/// Storage key for the cached user profile (serialized JSON)
pub const KEY_USER: &str = "user";

/// Storage key for the cached role
pub const KEY_ROLE: &str = "role";

/// Paths whose 401 responses must never trigger a renewal attempt.
/// A rejected login is a rejected login, and renewal must not renew itself.
const AUTH_PATHS: [&str; 2] = [LOGIN_PATH, REFRESH_PATH];

/// Whether a request path targets one of the auth endpoints themselves.
pub fn is_auth_endpoint(path: &str) -> bool {
    AUTH_PATHS.contains(&path)
}
