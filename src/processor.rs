//! The seam between the transport adapter and the processing pipeline.

use async_trait::async_trait;

/// A processor of raw request payloads.
///
/// Implementations must convert every internal failure into an encoded error
/// response; `process` has no failure path by contract. This is what lets the
/// transport adapter dispatch blindly without any error handling of its own.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Handle one raw request and return the raw response bytes.
    async fn process(&self, request: &[u8]) -> Vec<u8>;
}
