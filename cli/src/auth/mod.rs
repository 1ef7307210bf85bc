//! Authentication module for mediactl.
//!
//! This module provides the browser-mediated login handshake: a correlation
//! code ties the browser sign-in to this process, the credential is
//! collected by long-poll or local callback, verified with the service and
//! persisted to disk.

pub mod acquirer;
pub mod browser;
pub mod correlation;
pub mod credentials;
pub mod guard;
pub mod orchestrator;
pub mod tokens;
pub mod verify;

pub use acquirer::{CredentialAcquirer, LocalCallbackAcquirer, LongPollAcquirer};
pub use browser::{BrowserLauncher, PrintOnly, SystemBrowser};
pub use credentials::CredentialStore;
pub use orchestrator::{AuthHandle, AuthOutcome, AuthSuccess, Authenticator};
pub use tokens::Credential;
pub use verify::TokenVerifier;
