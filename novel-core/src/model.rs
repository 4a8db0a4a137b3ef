//! The model seam.
//!
//! Pipeline stages and the query agent talk to a [`Model`] rather than
//! the concrete API client, so tests can script replies with
//! [`crate::testing::MockModel`] instead of going over the wire.

use async_trait::async_trait;

/// A completion backend. The real implementation is [`gemini::Gemini`].
#[async_trait]
pub trait Model: Send + Sync {
    /// Run one completion request.
    async fn complete(&self, request: gemini::Request) -> Result<gemini::Response, gemini::Error>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl Model for gemini::Gemini {
    async fn complete(&self, request: gemini::Request) -> Result<gemini::Response, gemini::Error> {
        gemini::Gemini::complete(self, request).await
    }

    fn name(&self) -> &str {
        self.model()
    }
}
