//! The long-running `mediactl run` command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::auth::SystemBrowser;
use crate::cli::commands::auth::wait_for_login;
use crate::config::AppConfig;
use crate::error::Result;
use crate::keys::injector_from_config;
use crate::manager::SessionManager;
use crate::session::{KeyDispatcher, SessionStatus};

/// Handle the `mediactl run` command.
///
/// Connects with the stored credential (logging in first if there is none)
/// and forwards remote key commands until Ctrl-C. Lost connections are
/// retried up to `retries` times in a row. A credential the service refuses
/// is removed so the next run starts with a fresh login.
pub async fn handle_run(config: AppConfig, retries: u32, retry_delay: Duration) -> Result<()> {
    let injector = injector_from_config(&config.keys)?;
    let manager = SessionManager::new(config, Arc::new(SystemBrowser))?;

    let success = if let Some(success) = manager.restore().await? {
        success
    } else {
        println!("No stored login. Complete the sign-in in your browser.");
        wait_for_login(manager.login()).await?
    };
    println!("Logged in as {}.", success.user.display_name());

    let session = manager.open_session(&success.credential)?;
    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    session.set_status_handler(Arc::new(move |status: SessionStatus| {
        let _ = status_tx.send(status);
    }));
    session.set_command_handler(KeyDispatcher::new(injector).into_handler());

    let mut failures = 0;
    loop {
        while statuses.try_recv().is_ok() {}

        match session.connect().await {
            Ok(()) => {
                failures = 0;
                println!(
                    "Connected to {}. Waiting for remote commands (Ctrl-C to quit).",
                    session.endpoint()
                );
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        session.close();
                        println!("Disconnected.");
                        return Ok(());
                    }
                    () = disconnected(&mut statuses) => {
                        println!("Connection lost.");
                    }
                }
            },
            Err(e) if e.requires_reauth() => {
                manager.logout()?;
                return Err(e);
            },
            Err(e) => {
                failures += 1;
                if !e.is_retriable() || failures > retries {
                    return Err(e);
                }
                tracing::warn!(error = %e, attempt = failures, "Connect failed");
            },
        }

        println!("Reconnecting in {}s...", retry_delay.as_secs());
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.close();
                return Ok(());
            }
            () = tokio::time::sleep(retry_delay) => {}
        }
    }
}

async fn disconnected(statuses: &mut UnboundedReceiver<SessionStatus>) {
    while let Some(status) = statuses.recv().await {
        if status == SessionStatus::Disconnected {
            return;
        }
    }
}
