//! Application configuration settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::paths::default_token_file;

/// Main configuration for mediactl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web service settings.
    pub service: ServiceConfig,
    /// Login settings.
    pub auth: AuthConfig,
    /// Realtime session settings.
    pub session: SessionConfig,
    /// Local key injection settings.
    pub keys: KeysConfig,
}

/// Web service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the web application.
    #[serde(with = "url_serde")]
    pub base_url: Url,
    /// Timeout for ordinary API requests in seconds.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:3000").expect("valid default URL"),
            timeout_secs: 30,
        }
    }
}

/// How the credential is collected once the browser step is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcquireStrategy {
    /// Long-poll the token-by-code endpoint.
    #[default]
    Poll,
    /// Listen on a local port for the browser redirect.
    Callback,
}

impl std::fmt::Display for AcquireStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Callback => write!(f, "callback"),
        }
    }
}

impl TryFrom<&str> for AcquireStrategy {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "callback" => Ok(Self::Callback),
            _ => Err(format!("Unknown acquire strategy: {s}")),
        }
    }
}

/// Login configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where the credential is persisted.
    pub token_file: PathBuf,
    /// Credential acquisition strategy.
    pub strategy: AcquireStrategy,
    /// Port of the local callback listener.
    pub callback_port: u16,
    /// Overall deadline for receiving the credential, in seconds.
    pub handshake_timeout_secs: u64,
    /// Re-check a persisted credential with the service before using it.
    pub verify_on_startup: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            strategy: AcquireStrategy::Poll,
            callback_port: 3001,
            handshake_timeout_secs: 60,
            verify_on_startup: true,
        }
    }
}

impl AuthConfig {
    /// Handshake deadline as a [`Duration`].
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Realtime session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for the WebSocket upgrade, in seconds.
    pub handshake_timeout_secs: u64,
    /// Capacity of the outbound message queue.
    pub send_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 45,
            send_queue_capacity: 256,
        }
    }
}

/// Which key injector handles remote commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InjectorKind {
    /// Only log received key codes.
    #[default]
    Log,
    /// Run an external program with the key code appended.
    Command,
}

/// Key injection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Injector selection.
    pub injector: InjectorKind,
    /// Program and leading arguments for [`InjectorKind::Command`].
    pub command: Vec<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            injector: InjectorKind::Log,
            command: vec!["xdotool".to_string(), "key".to_string()],
        }
    }
}

/// Custom serde module for URL serialization.
mod url_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S>(url: &Url, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(url.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const SERVICE_URL: &str = "MEDIACTL_SERVICE_URL";
    pub const TOKEN_FILE: &str = "MEDIACTL_TOKEN_FILE";
    pub const AUTH_STRATEGY: &str = "MEDIACTL_AUTH_STRATEGY";
    pub const LOG_LEVEL: &str = "MEDIACTL_LOG";
}

impl AppConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(env::SERVICE_URL) {
            if let Ok(parsed) = Url::parse(&url) {
                self.service.base_url = parsed;
            }
        }

        if let Ok(path) = std::env::var(env::TOKEN_FILE) {
            if !path.is_empty() {
                self.auth.token_file = PathBuf::from(path);
            }
        }

        if let Ok(strategy) = std::env::var(env::AUTH_STRATEGY) {
            if let Ok(s) = strategy.as_str().try_into() {
                self.auth.strategy = s;
            }
        }

        self
    }
}
