//! Error types and result aliases for mediactl.
//!
//! This module provides the error taxonomy shared by the authentication
//! handshake and the realtime session:
//! - Specific error variants for each failure mode
//! - User-friendly error messages with recovery suggestions
//! - Helper methods for error classification
//! - Automatic conversion from common error types

use thiserror::Error;

/// Main error type for mediactl operations.
///
/// Each variant includes a user-friendly message with actionable recovery steps.
/// Use [`requires_reauth`](Self::requires_reauth) and [`is_retriable`](Self::is_retriable)
/// to determine appropriate error handling strategies.
#[derive(Error, Debug)]
pub enum AppError {
    /// No persisted credential exists.
    #[error("Not logged in. Run 'mediactl login' to authenticate.")]
    CredentialNotFound,

    /// The default browser could not be launched.
    #[error("Could not open the browser: {0}. Open the login URL manually.")]
    BrowserLaunch(String),

    /// Another login is already waiting for its credential.
    #[error("A login is already in progress. Finish or cancel it before starting another.")]
    HandshakeInProgress,

    /// The credential did not arrive before the handshake deadline.
    #[error("Timed out waiting for the browser login to complete. Run 'mediactl login' to try again.")]
    AcquisitionTimeout,

    /// The credential request failed at the transport level.
    #[error("Failed to obtain the login credential: {0}")]
    AcquisitionTransport(String),

    /// A response or stored file was not valid JSON for the expected shape.
    #[error("Malformed data: {0}")]
    Decode(String),

    /// The service rejected the credential (403).
    #[error("The service rejected the credential. Run 'mediactl login' to re-authenticate.")]
    Forbidden,

    /// The service answered with an unexpected status.
    #[error("Service returned unexpected status {status}. Try again later.")]
    TransientService {
        /// HTTP status code.
        status: u16,
    },

    /// The credential could not be written to or removed from disk.
    #[error("Failed to persist credential: {0}. Check directory permissions.")]
    Persistence(String),

    /// The login attempt was cancelled by the caller.
    #[error("Login cancelled.")]
    Cancelled,

    /// The realtime channel could not be established.
    #[error("Realtime connection failed: {0}")]
    Connection(String),

    /// A realtime frame could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No realtime link is currently open.
    #[error("Not connected to the realtime service.")]
    NotConnected,

    /// The outbound queue is full; the message was dropped.
    #[error("Outbound queue is full; message dropped.")]
    QueueFull,

    /// The key-injection collaborator reported a failure.
    #[error("Key injection failed for '{code}': {reason}")]
    KeyInjection {
        /// Key code that failed.
        code: String,
        /// Failure description.
        reason: String,
    },

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AppError {
    /// Checks if this error can be resolved by logging in again.
    ///
    /// Returns `true` for errors related to missing, rejected, or unreadable credentials.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::CredentialNotFound | Self::Forbidden | Self::AcquisitionTimeout
        )
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    ///
    /// Retry is always the caller's decision; nothing in mediactl retries on its own.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionTransport(_)
                | Self::TransientService { .. }
                | Self::Connection(_)
                | Self::QueueFull
        )
    }
}

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::AcquisitionTimeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::AcquisitionTransport(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for AppError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(inner) => inner.into(),
            reqwest_middleware::Error::Middleware(inner) => {
                Self::AcquisitionTransport(inner.to_string())
            },
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
