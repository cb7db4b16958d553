//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The seed password is loaded from the MOCK_SEED_PASSWORD env var or
//! `password_file`, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub seed: SeedConfig,
}

/// HTTP listener and token policy settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Whether a refresh exchange rotates the refresh token.
    #[serde(default = "default_rotate")]
    pub rotate_refresh_tokens: bool,
}

/// The one account the mock backend knows about
#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    pub email: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// Path to a file containing the seed password (alternative to the
    /// MOCK_SEED_PASSWORD env var)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
}

fn default_max_connections() -> usize {
    256
}

fn default_token_ttl() -> u64 {
    900
}

fn default_rotate() -> bool {
    true
}

fn default_role() -> String {
    "student".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Seed password resolution order:
    /// 1. MOCK_SEED_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.token_ttl_secs == 0 {
            return Err(common::Error::Config(
                "token_ttl_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.seed.email.trim().is_empty() {
            return Err(common::Error::Config("seed account has no email".into()));
        }

        // Resolve seed password: env var takes precedence over file
        if let Ok(password) = std::env::var("MOCK_SEED_PASSWORD") {
            config.seed.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.seed.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim().to_owned();
            if !password.is_empty() {
                config.seed.password = Some(Secret::new(password));
            }
        }

        if config.seed.password.is_none() {
            return Err(common::Error::Config(
                "no seed password: set MOCK_SEED_PASSWORD or seed.password_file".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("campus-mock-api.toml")
    }
}
