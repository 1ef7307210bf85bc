//! Authentication command handlers.

use std::sync::Arc;

use crate::auth::{AuthHandle, AuthOutcome, AuthSuccess, BrowserLauncher, PrintOnly, SystemBrowser};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::manager::SessionManager;

/// Picks the launcher for `--no-browser`.
pub fn launcher(no_browser: bool) -> Arc<dyn BrowserLauncher> {
    if no_browser {
        Arc::new(PrintOnly)
    } else {
        Arc::new(SystemBrowser)
    }
}

/// Waits for a login, cancelling it on Ctrl-C.
pub async fn wait_for_login(handle: AuthHandle) -> AuthOutcome {
    let cancel = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = handle.outcome().await;
    interrupt.abort();
    outcome
}

/// Handle the `mediactl login` command.
pub async fn handle_login(config: AppConfig, no_browser: bool) -> Result<()> {
    println!(
        "Logging in to {} ({} strategy)...",
        config.service.base_url, config.auth.strategy
    );
    println!();

    let manager = SessionManager::new(config, launcher(no_browser))?;

    println!("Complete the sign-in in your browser. Press Ctrl-C to cancel.");
    let success = wait_for_login(manager.login()).await?;

    println!();
    println!("Successfully logged in as {}!", success.user.display_name());

    Ok(())
}

/// Handle the `mediactl logout` command.
pub fn handle_logout(config: AppConfig) -> Result<()> {
    let manager = SessionManager::new(config, launcher(true))?;

    if manager.logout()? {
        println!("Successfully logged out.");
    } else {
        println!("Not currently logged in.");
    }

    Ok(())
}

/// Handle the `mediactl status` command.
pub async fn handle_status(config: AppConfig, offline: bool) -> Result<()> {
    let manager = SessionManager::new(config, launcher(true))?;

    let restored = if offline {
        match manager.store().load() {
            Ok(credential) => Some(AuthSuccess {
                user: credential.local_user_data(),
                credential,
            }),
            Err(AppError::CredentialNotFound | AppError::Decode(_)) => None,
            Err(e) => return Err(e),
        }
    } else {
        manager.restore().await?
    };

    match restored {
        Some(success) => {
            println!("Logged in");
            println!();
            println!("  User:       {}", success.user.display_name());
            println!("  User ID:    {}", success.credential.user_id);
            println!("  Service:    {}", manager.config().service.base_url);
            println!("  Credential: {}", manager.store().path().display());
            if offline {
                println!();
                println!("  (not verified with the service)");
            }
        },
        None => {
            println!("Not logged in");
            println!();
            println!("Run 'mediactl login' to authenticate.");
        },
    }

    Ok(())
}
