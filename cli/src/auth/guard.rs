//! Mutual exclusion for credential acquisition.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{AppError, Result};

/// Single-permit guard allowing one login attempt at a time.
///
/// Cloning shares the same permit.
#[derive(Debug, Clone)]
pub struct HandshakeGuard {
    permit: Arc<Semaphore>,
}

/// Proof that the holder owns the guard; released on drop.
#[derive(Debug)]
pub struct HandshakeRegistration {
    _permit: OwnedSemaphorePermit,
}

impl HandshakeGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Registers a login attempt without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::HandshakeInProgress`] if another attempt holds the guard.
    pub fn register(&self) -> Result<HandshakeRegistration> {
        Arc::clone(&self.permit)
            .try_acquire_owned()
            .map(|permit| HandshakeRegistration { _permit: permit })
            .map_err(|_| AppError::HandshakeInProgress)
    }

    /// Whether an attempt currently holds the guard.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

/// Registration shared between a login's handle and its task.
///
/// Whichever side releases first frees the guard; later releases do nothing.
#[derive(Debug, Clone, Default)]
pub struct RegistrationSlot(Arc<Mutex<Option<HandshakeRegistration>>>);

impl RegistrationSlot {
    #[must_use]
    pub fn new(registration: HandshakeRegistration) -> Self {
        Self(Arc::new(Mutex::new(Some(registration))))
    }

    /// Drops the held registration, if any.
    pub fn release(&self) {
        let taken = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(taken);
    }
}

impl Default for HandshakeGuard {
    fn default() -> Self {
        Self::new()
    }
}
