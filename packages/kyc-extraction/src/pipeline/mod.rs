//! Extraction pipeline: request a transcription, then normalize it.
//!
//! ```rust,ignore
//! use kyc_extraction::{DocumentKind, KycExtractor};
//! use kyc_extraction::testing::MockRequester;
//!
//! let extractor = KycExtractor::new(MockRequester::new(), DocumentKind::Pan.policy());
//! let fields = extractor.extract_document(&image_bytes).await?;
//! ```

pub mod normalize;
pub mod prompts;

pub use normalize::{locate_object, normalize, repair_escapes, Normalizer, SpanStrategy};
pub use prompts::{instruction, json_template, system_prompt};

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::traits::requester::ExtractionRequester;
use crate::types::document::DocumentPolicy;
use crate::types::fields::{ExtractedFields, RawModelOutput};

/// The caller-imposed deadline on a model call elapsed.
#[derive(Debug, thiserror::Error)]
#[error("model call timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Result of a full extraction, keeping the raw text for audit or replay.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub raw: RawModelOutput,
    pub fields: ExtractedFields,
}

/// Couples a requester with a document policy.
///
/// Stateless apart from configuration; one instance can serve concurrent
/// calls for independent images.
pub struct KycExtractor<R: ExtractionRequester> {
    requester: R,
    normalizer: Normalizer,
    instruction: String,
    timeout: Option<Duration>,
}

impl<R: ExtractionRequester> KycExtractor<R> {
    /// Create an extractor using the policy's default instruction and the
    /// greedy span strategy, with no timeout.
    pub fn new(requester: R, policy: DocumentPolicy) -> Self {
        Self {
            requester,
            instruction: prompts::instruction(&policy),
            normalizer: Normalizer::new(policy),
            timeout: None,
        }
    }

    /// Bound each model call; expiry is reported as `ExtractionFailed`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the instruction sent with each image.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Use a different span strategy when normalizing.
    pub fn with_span_strategy(mut self, span: SpanStrategy) -> Self {
        self.normalizer = self.normalizer.with_span_strategy(span);
        self
    }

    pub fn policy(&self) -> &DocumentPolicy {
        self.normalizer.policy()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Run the model call only, honoring the timeout.
    pub async fn request(&self, image: &[u8]) -> Result<RawModelOutput> {
        let call = self.requester.extract(&self.instruction, image);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!(timeout_ms = limit.as_millis(), "Vision model call timed out");
                ExtractionError::extraction_failed(TimedOut(limit))
            })?,
            None => call.await,
        }
    }

    /// Extract and normalize, returning both the raw text and the fields.
    pub async fn extract(&self, image: &[u8]) -> Result<Extraction> {
        let start = Instant::now();
        let raw = self.request(image).await?;
        let fields = self.normalizer.normalize(raw.as_str())?;

        info!(
            kind = %self.policy().kind,
            fields = fields.len(),
            duration_ms = start.elapsed().as_millis(),
            "Document fields extracted"
        );

        Ok(Extraction { raw, fields })
    }

    /// Extract and normalize, returning only the fields.
    pub async fn extract_document(&self, image: &[u8]) -> Result<ExtractedFields> {
        self.extract(image).await.map(|extraction| extraction.fields)
    }

    /// Normalize previously captured model output under this policy.
    pub fn normalize_raw(&self, raw: &str) -> Result<ExtractedFields> {
        self.normalizer.normalize(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRequester;
    use crate::types::document::DocumentKind;

    #[tokio::test]
    async fn test_extract_document_normalizes_reply() {
        let mock = MockRequester::new().with_default_response(
            "Sure! {\"Name\": \"Jane Doe\\nJohn Doe\", \"PAN Number\": \"abcde 1234 f\"}",
        );
        let extractor = KycExtractor::new(mock, DocumentKind::Pan.policy());

        let fields = extractor.extract_document(b"image").await.unwrap();
        assert_eq!(fields.get_str("Name"), Some("Jane Doe"));
        assert_eq!(fields.get_str("Father's Name"), Some("John Doe"));
        assert_eq!(fields.get_str("PAN Number"), Some("ABCDE1234F"));
    }

    #[tokio::test]
    async fn test_instruction_comes_from_policy() {
        let extractor = KycExtractor::new(MockRequester::new(), DocumentKind::Aadhaar.policy());
        extractor.extract(b"image").await.unwrap();

        let calls = extractor.requester().calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].instruction.contains("Aadhaar Number"));
        assert_eq!(calls[0].instruction, extractor.instruction());
    }

    #[tokio::test]
    async fn test_timeout_is_extraction_failed() {
        let mock = MockRequester::new().with_delay(Duration::from_millis(200));
        let extractor = KycExtractor::new(mock, DocumentPolicy::default())
            .with_timeout(Some(Duration::from_millis(10)));

        let err = extractor.extract_document(b"image").await.unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_no_json_reply_surfaces_no_structured_data() {
        let mock = MockRequester::new().with_default_response("The image is too blurry.");
        let extractor = KycExtractor::new(mock, DocumentPolicy::default());

        let err = extractor.extract_document(b"image").await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructuredDataFound));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_extract_keeps_raw_text() {
        let reply = "```json\n{\"Name\": \" A \"}\n```";
        let extractor = KycExtractor::new(
            MockRequester::new().with_default_response(reply),
            DocumentPolicy::default(),
        );

        let extraction = extractor.extract(b"image").await.unwrap();
        assert_eq!(extraction.raw.as_str(), reply);
        assert_eq!(extraction.fields.get_str("Name"), Some("A"));
    }

    #[test]
    fn test_normalize_raw_uses_span_strategy() {
        let extractor = KycExtractor::new(MockRequester::new(), DocumentPolicy::default())
            .with_span_strategy(SpanStrategy::Balanced);
        let fields = extractor
            .normalize_raw("{\"Name\": \"A\"} and {}")
            .unwrap();
        assert_eq!(fields.get_str("Name"), Some("A"));
    }
}
