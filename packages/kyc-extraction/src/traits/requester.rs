//! Requester trait for vision model calls.
//!
//! The requester is the pipeline's only network dependency. Keeping it behind
//! a trait lets recorded model outputs stand in for the live model in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::fields::RawModelOutput;

/// Sends a document image plus an instruction to a vision-capable model.
///
/// Implementations wrap specific providers (OpenAI-compatible endpoints,
/// local servers) and must:
/// - send a `system` turn demanding JSON-only output and a `user` turn with
///   the instruction text followed by the image as a data URI
/// - sample deterministically with a bounded completion length
/// - return the model text untouched
/// - report every failure as [`ExtractionError::ExtractionFailed`], without retrying
///
/// [`ExtractionError::ExtractionFailed`]: crate::error::ExtractionError::ExtractionFailed
#[async_trait]
pub trait ExtractionRequester: Send + Sync {
    /// Transcribe `image` according to `instruction`.
    async fn extract(&self, instruction: &str, image: &[u8]) -> Result<RawModelOutput>;
}

#[async_trait]
impl<T: ExtractionRequester + ?Sized> ExtractionRequester for std::sync::Arc<T> {
    async fn extract(&self, instruction: &str, image: &[u8]) -> Result<RawModelOutput> {
        (**self).extract(instruction, image).await
    }
}

#[async_trait]
impl<T: ExtractionRequester + ?Sized> ExtractionRequester for Box<T> {
    async fn extract(&self, instruction: &str, image: &[u8]) -> Result<RawModelOutput> {
        (**self).extract(instruction, image).await
    }
}
