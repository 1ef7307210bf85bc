//! Launching the browser at the service's authorization page.

use url::Url;

use crate::auth::correlation::CorrelationCode;
use crate::client::join_path;
use crate::error::{AppError, Result};

/// Opens a URL for the user to complete the login.
#[cfg_attr(test, mockall::automock)]
pub trait BrowserLauncher: Send + Sync {
    /// Opens `url`; only the launch itself is reported.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BrowserLaunch`] if the browser cannot be started.
    fn open(&self, url: &Url) -> Result<()>;
}

/// Uses the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &Url) -> Result<()> {
        open::that(url.as_str()).map_err(|e| AppError::BrowserLaunch(e.to_string()))
    }
}

/// Prints the URL instead of launching anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintOnly;

impl BrowserLauncher for PrintOnly {
    fn open(&self, url: &Url) -> Result<()> {
        println!("Open this URL in your browser to log in:");
        println!();
        println!("  {url}");
        println!();
        Ok(())
    }
}

/// Builds `{base}/auth/callback?defcode={code}`.
///
/// # Errors
///
/// Returns [`AppError::Config`] if the base URL cannot carry a path.
pub fn authorization_url(base: &Url, code: &CorrelationCode) -> Result<Url> {
    let mut url = join_path(base, "/auth/callback")?;
    url.query_pairs_mut().append_pair("defcode", code.as_str());
    Ok(url)
}
