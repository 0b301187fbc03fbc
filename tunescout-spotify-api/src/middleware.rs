//! Session policy applied to every catalog response.

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;

use crate::credentials::CredentialManager;

/// Reacts to `401 Unauthorized` by clearing the session and navigating to
/// the login entry point. The response itself is passed through unchanged.
pub struct UnauthorizedMiddleware {
    credentials: Arc<CredentialManager>,
}

impl UnauthorizedMiddleware {
    #[must_use]
    pub const fn new(credentials: Arc<CredentialManager>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Middleware for UnauthorizedMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let response = next.run(req, extensions).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.credentials.handle_unauthorized().await;
        }
        Ok(response)
    }
}
