//! Authentication middleware for injecting Bearer tokens.

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// Session token attached to a single request as an extension.
#[derive(Clone)]
pub struct SessionToken(pub String);

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Middleware that turns a [`SessionToken`] extension into an
/// `Authorization: Bearer` header.
#[derive(Debug, Default)]
pub struct BearerAuthMiddleware;

#[async_trait]
impl Middleware for BearerAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(SessionToken(token)) = extensions.get::<SessionToken>() {
            if let Ok(value) = format!("Bearer {token}").parse() {
                req.headers_mut().insert(http::header::AUTHORIZATION, value);
            }
        }

        next.run(req, extensions).await
    }
}
