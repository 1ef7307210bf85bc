//! Browser login orchestration.
//!
//! A login runs as one background task: open the browser with a fresh
//! correlation code, wait for the credential, verify it, persist it. The
//! caller gets an [`AuthHandle`] right away and receives exactly one
//! [`AuthOutcome`] from it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::acquirer::CredentialAcquirer;
use crate::auth::browser::{authorization_url, BrowserLauncher};
use crate::auth::correlation::CorrelationCode;
use crate::auth::credentials::CredentialStore;
use crate::auth::guard::{HandshakeGuard, RegistrationSlot};
use crate::auth::tokens::{Credential, UserData};
use crate::auth::verify::TokenVerifier;
use crate::error::{AppError, Result};

/// A verified, persisted login.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub credential: Credential,
    pub user: UserData,
}

/// Result of one login attempt.
pub type AuthOutcome = Result<AuthSuccess>;

/// Cancels one login; clones cancel the same login.
#[derive(Debug, Clone)]
pub struct LoginCanceller {
    token: CancellationToken,
    registration: RegistrationSlot,
}

impl LoginCanceller {
    /// Abandons the login and releases its registration before returning.
    ///
    /// A browser launch or network call that already completed is not undone.
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.registration.release();
        self.token.cancel();
    }
}

/// Handle to an in-flight login.
#[derive(Debug)]
pub struct AuthHandle {
    result: oneshot::Receiver<AuthOutcome>,
    canceller: LoginCanceller,
}

impl AuthHandle {
    /// See [`LoginCanceller::cancel`].
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Canceller usable from other tasks.
    #[must_use]
    pub fn canceller(&self) -> LoginCanceller {
        self.canceller.clone()
    }

    /// Waits for the single outcome of the login.
    pub async fn outcome(self) -> AuthOutcome {
        self.result.await.unwrap_or(Err(AppError::Cancelled))
    }
}

/// Drives browser logins against one service.
pub struct Authenticator {
    base_url: Url,
    browser: Arc<dyn BrowserLauncher>,
    acquirer: Arc<dyn CredentialAcquirer>,
    verifier: TokenVerifier,
    store: CredentialStore,
    guard: HandshakeGuard,
    timeout: Duration,
    code_source: fn() -> CorrelationCode,
}

impl Authenticator {
    pub fn new(
        base_url: Url,
        browser: Arc<dyn BrowserLauncher>,
        acquirer: Arc<dyn CredentialAcquirer>,
        verifier: TokenVerifier,
        store: CredentialStore,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url,
            browser,
            acquirer,
            verifier,
            store,
            guard: HandshakeGuard::new(),
            timeout,
            code_source: CorrelationCode::generate,
        }
    }

    /// Replaces the correlation code generator.
    #[must_use]
    pub fn with_code_source(mut self, code_source: fn() -> CorrelationCode) -> Self {
        self.code_source = code_source;
        self
    }

    /// Guard serialising logins started from this authenticator.
    #[must_use]
    pub const fn guard(&self) -> &HandshakeGuard {
        &self.guard
    }

    /// Starts a login in the background.
    ///
    /// Must be called from within a tokio runtime. If another login from this
    /// authenticator is still running, the returned handle resolves at once
    /// with [`AppError::HandshakeInProgress`].
    pub fn start(&self) -> AuthHandle {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let registration = match self.guard.register() {
            Ok(registration) => RegistrationSlot::new(registration),
            Err(e) => {
                tracing::warn!("Login requested while another is in progress");
                let _ = tx.send(Err(e));
                return AuthHandle {
                    result: rx,
                    canceller: LoginCanceller {
                        token: cancel,
                        registration: RegistrationSlot::default(),
                    },
                };
            },
        };
        let handle = AuthHandle {
            result: rx,
            canceller: LoginCanceller {
                token: cancel.clone(),
                registration: registration.clone(),
            },
        };

        let flow = LoginFlow {
            base_url: self.base_url.clone(),
            browser: Arc::clone(&self.browser),
            acquirer: Arc::clone(&self.acquirer),
            verifier: self.verifier.clone(),
            store: self.store.clone(),
            timeout: self.timeout,
            code: (self.code_source)(),
        };

        tokio::spawn(run_login(flow, registration, cancel, tx));
        handle
    }
}

async fn run_login(
    flow: LoginFlow,
    registration: RegistrationSlot,
    cancel: CancellationToken,
    tx: oneshot::Sender<AuthOutcome>,
) {
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AppError::Cancelled),
        outcome = flow.run() => outcome,
    };

    // Released before the outcome is sent.
    registration.release();

    match &outcome {
        Ok(success) => tracing::info!(user_id = %success.credential.user_id, "Login complete"),
        Err(e) => tracing::warn!(error = %e, "Login failed"),
    }
    let _ = tx.send(outcome);
}

struct LoginFlow {
    base_url: Url,
    browser: Arc<dyn BrowserLauncher>,
    acquirer: Arc<dyn CredentialAcquirer>,
    verifier: TokenVerifier,
    store: CredentialStore,
    timeout: Duration,
    code: CorrelationCode,
}

impl LoginFlow {
    async fn run(self) -> AuthOutcome {
        let url = authorization_url(&self.base_url, &self.code)?;
        tracing::info!(code = %self.code, "Opening browser for login");
        self.browser.open(&url)?;

        let credential = tokio::time::timeout(self.timeout, self.acquirer.acquire(&self.code))
            .await
            .map_err(|_| AppError::AcquisitionTimeout)??;

        // A rejected credential is never written to disk.
        let user = self
            .verifier
            .verify(&credential)
            .await?
            .with_fallback_profile(&credential);

        self.store.save(&credential)?;

        Ok(AuthSuccess { credential, user })
    }
}
