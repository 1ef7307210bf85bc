//! Ties login, the stored credential and the realtime session together.

use std::sync::Arc;

use crate::auth::{
    AuthHandle, AuthSuccess, Authenticator, BrowserLauncher, Credential, CredentialAcquirer,
    CredentialStore, LocalCallbackAcquirer, LongPollAcquirer, TokenVerifier,
};
use crate::client::ServiceClient;
use crate::config::{AcquireStrategy, AppConfig};
use crate::error::{AppError, Result};
use crate::session::RealtimeSession;

/// Entry point used by the command handlers.
pub struct SessionManager {
    config: AppConfig,
    client: ServiceClient,
    store: CredentialStore,
    verifier: TokenVerifier,
    authenticator: Authenticator,
}

impl SessionManager {
    /// Builds a manager whose acquirer follows `config.auth.strategy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: AppConfig, browser: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let client = ServiceClient::new(&config.service)?;
        let acquirer: Arc<dyn CredentialAcquirer> = match config.auth.strategy {
            AcquireStrategy::Poll => Arc::new(LongPollAcquirer::new(
                client.clone(),
                config.auth.handshake_timeout(),
            )),
            AcquireStrategy::Callback => {
                Arc::new(LocalCallbackAcquirer::new(config.auth.callback_port))
            },
        };
        Ok(Self::with_acquirer(config, client, browser, acquirer))
    }

    /// Builds a manager around an explicit acquirer.
    pub fn with_acquirer(
        config: AppConfig,
        client: ServiceClient,
        browser: Arc<dyn BrowserLauncher>,
        acquirer: Arc<dyn CredentialAcquirer>,
    ) -> Self {
        let store = CredentialStore::new(&config.auth.token_file);
        let verifier = TokenVerifier::new(client.clone());
        let authenticator = Authenticator::new(
            client.base_url().clone(),
            browser,
            acquirer,
            verifier.clone(),
            store.clone(),
            config.auth.handshake_timeout(),
        );

        Self {
            config,
            client,
            store,
            verifier,
            authenticator,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Starts a browser login.
    pub fn login(&self) -> AuthHandle {
        self.authenticator.start()
    }

    /// Removes the stored credential. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the file cannot be removed.
    pub fn logout(&self) -> Result<bool> {
        let removed = self.store.delete()?;
        if removed {
            tracing::info!(path = %self.store.path().display(), "Credential removed");
        }
        Ok(removed)
    }

    /// Loads the stored credential for use without a new login.
    ///
    /// Returns `None` when there is nothing usable on disk. With
    /// `verify_on_startup` the credential is checked first: a 403 deletes it,
    /// any other failure falls back to the profile stored with it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read or removed.
    pub async fn restore(&self) -> Result<Option<AuthSuccess>> {
        let credential = match self.store.load() {
            Ok(credential) => credential,
            Err(AppError::CredentialNotFound) => return Ok(None),
            Err(e @ AppError::Decode(_)) => {
                tracing::warn!(error = %e, "Stored credential is unusable; login required");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        if !self.config.auth.verify_on_startup {
            tracing::debug!(
                user_id = %credential.user_id,
                "Using stored credential without verification"
            );
            return Ok(Some(stored(credential)));
        }

        match self.verifier.verify(&credential).await {
            Ok(user) => Ok(Some(AuthSuccess {
                user: user.with_fallback_profile(&credential),
                credential,
            })),
            Err(AppError::Forbidden) => {
                tracing::warn!("Stored credential was rejected; removing it");
                self.store.delete()?;
                Ok(None)
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not verify stored credential; using stored profile"
                );
                Ok(Some(stored(credential)))
            },
        }
    }

    /// Creates a disconnected realtime session for `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the service URL has no realtime form.
    pub fn open_session(&self, credential: &Credential) -> Result<RealtimeSession> {
        RealtimeSession::new(self.client.base_url(), credential, &self.config.session)
    }
}

fn stored(credential: Credential) -> AuthSuccess {
    AuthSuccess {
        user: credential.local_user_data(),
        credential,
    }
}
