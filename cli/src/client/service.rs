//! HTTP client for the web service's REST endpoints.

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use url::Url;

use crate::client::middleware::{BearerAuthMiddleware, SessionToken};
use crate::config::ServiceConfig;
use crate::error::{AppError, Result};

/// Appends `path` to `base`, keeping any path prefix the base carries.
///
/// A trailing slash on `path` is kept. Query and fragment are dropped.
///
/// # Errors
///
/// Returns [`AppError::Config`] if `base` cannot carry a path.
pub fn join_path(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| AppError::Config(format!("'{base}' cannot carry a path")))?;
        segments
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        if path.ends_with('/') {
            segments.push("");
        }
    }
    Ok(url)
}

/// Shared client for talking to the web service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl ServiceClient {
    /// Create a new service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("mediactl/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Cannot build HTTP client: {e}")))?;

        let client = ClientBuilder::new(inner_client)
            .with(BearerAuthMiddleware)
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Resolve a service path under the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the base URL cannot carry a path.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        join_path(&self.base_url, path)
    }

    /// Start an unauthenticated GET request.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a GET request carrying the session token as a bearer credential.
    pub fn authorized_get(&self, url: Url, token: &str) -> RequestBuilder {
        self.client
            .get(url)
            .with_extension(SessionToken(token.to_string()))
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
