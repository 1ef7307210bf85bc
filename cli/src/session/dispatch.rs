//! Validation of inbound frames and delivery of accepted key codes.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::keys::KeyInjector;
use crate::session::client::CommandHandler;
use crate::session::messages::{InboundCommand, KEY_CODE_TYPE};

/// Decides whether a frame is a key command addressed to `own_user_id`.
///
/// Returns the key code for accepted frames and `None` for frames that are
/// well-formed but not for us.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] if the payload is not a JSON object of the
/// expected shape. The caller skips the frame and keeps reading.
pub fn accept_frame(payload: &str, own_user_id: &str) -> Result<Option<String>> {
    let command: InboundCommand = serde_json::from_str(payload)
        .map_err(|e| AppError::Protocol(format!("undecodable frame: {e}")))?;

    if command.kind != KEY_CODE_TYPE {
        tracing::trace!(kind = %command.kind, "Ignoring non-command frame");
        return Ok(None);
    }

    if command.target_user_id != own_user_id {
        tracing::warn!(
            target_user = %command.target_user_id,
            expected = %own_user_id,
            "Ignoring command addressed to another user"
        );
        return Ok(None);
    }

    Ok(Some(command.key_code))
}

/// Forwards accepted key codes to a [`KeyInjector`].
pub struct KeyDispatcher {
    injector: Box<dyn KeyInjector>,
}

impl KeyDispatcher {
    #[must_use]
    pub fn new(injector: Box<dyn KeyInjector>) -> Self {
        Self { injector }
    }

    /// Presses `code`; failures are logged and swallowed.
    pub fn dispatch(&self, code: &str) {
        match self.injector.inject(code) {
            Ok(()) => tracing::info!(key_code = %code, "Remote key dispatched"),
            Err(e) => tracing::error!(key_code = %code, error = %e, "Remote key failed"),
        }
    }

    /// Wraps the dispatcher as a session command handler.
    #[must_use]
    pub fn into_handler(self) -> CommandHandler {
        Arc::new(move |code: &str| self.dispatch(code))
    }
}
