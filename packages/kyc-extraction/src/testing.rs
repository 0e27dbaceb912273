//! Testing utilities including a mock requester.
//!
//! Lets applications exercise the pipeline (and their own retry logic) with
//! recorded model outputs instead of a live vision model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{ExtractionError, Result};
use crate::traits::requester::ExtractionRequester;
use crate::types::fields::RawModelOutput;

/// A scripted model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// The model answers with this text.
    Text(String),
    /// The call fails with this message.
    Fail(String),
}

/// Error surfaced by [`MockRequester`] for scripted failures.
#[derive(Debug, thiserror::Error)]
#[error("mock model failure: {0}")]
pub struct MockFailure(pub String);

/// Record of a call made to the mock requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequestCall {
    pub instruction: String,
    pub image_len: usize,
    pub image_digest: String,
}

/// A mock requester for testing.
///
/// Replies are chosen in this order: a reply registered for the exact image
/// bytes, then the next queued reply, then the default reply.
#[derive(Default)]
pub struct MockRequester {
    /// Replies keyed by SHA-256 of the image
    by_image: Arc<RwLock<HashMap<String, MockReply>>>,

    /// Replies handed out once each, in order
    queue: Arc<RwLock<VecDeque<MockReply>>>,

    /// Reply when nothing else matches
    default_reply: Option<MockReply>,

    /// Artificial latency before replying
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockRequestCall>>>,
}

impl MockRequester {
    /// Create a mock that answers every call with an empty JSON object.
    pub fn new() -> Self {
        Self {
            default_reply: Some(MockReply::Text("{}".to_string())),
            ..Default::default()
        }
    }

    /// Answer every otherwise unmatched call with `raw`.
    pub fn with_default_response(mut self, raw: impl Into<String>) -> Self {
        self.default_reply = Some(MockReply::Text(raw.into()));
        self
    }

    /// Fail every otherwise unmatched call.
    pub fn with_default_failure(mut self, message: impl Into<String>) -> Self {
        self.default_reply = Some(MockReply::Fail(message.into()));
        self
    }

    /// Queue a reply for the next unmatched call.
    pub fn with_queued(self, reply: MockReply) -> Self {
        self.queue.write().unwrap().push_back(reply);
        self
    }

    /// Queue a text reply for the next unmatched call.
    pub fn with_queued_response(self, raw: impl Into<String>) -> Self {
        self.with_queued(MockReply::Text(raw.into()))
    }

    /// Reply with `raw` whenever these exact image bytes are sent.
    pub fn with_response_for_image(self, image: &[u8], raw: impl Into<String>) -> Self {
        self.by_image
            .write()
            .unwrap()
            .insert(digest(image), MockReply::Text(raw.into()));
        self
    }

    /// Sleep before replying (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockRequestCall> {
        self.calls.read().unwrap().clone()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn next_reply(&self, image_digest: &str) -> Option<MockReply> {
        if let Some(reply) = self.by_image.read().unwrap().get(image_digest) {
            return Some(reply.clone());
        }
        if let Some(reply) = self.queue.write().unwrap().pop_front() {
            return Some(reply);
        }
        self.default_reply.clone()
    }
}

#[async_trait]
impl ExtractionRequester for MockRequester {
    async fn extract(&self, instruction: &str, image: &[u8]) -> Result<RawModelOutput> {
        let image_digest = digest(image);
        self.calls.write().unwrap().push(MockRequestCall {
            instruction: instruction.to_string(),
            image_len: image.len(),
            image_digest: image_digest.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(&image_digest) {
            Some(MockReply::Text(raw)) => Ok(RawModelOutput::new(raw)),
            Some(MockReply::Fail(message)) => {
                Err(ExtractionError::extraction_failed(MockFailure(message)))
            }
            None => Err(ExtractionError::extraction_failed(MockFailure(
                "no scripted reply".to_string(),
            ))),
        }
    }
}

fn digest(image: &[u8]) -> String {
    format!("{:x}", Sha256::digest(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_precedence() {
        let mock = MockRequester::new()
            .with_default_response("default")
            .with_queued_response("first")
            .with_response_for_image(b"known", "by-image");

        assert_eq!(mock.extract("i", b"known").await.unwrap().as_str(), "by-image");
        assert_eq!(mock.extract("i", b"other").await.unwrap().as_str(), "first");
        assert_eq!(mock.extract("i", b"other").await.unwrap().as_str(), "default");
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let mock = MockRequester::new();
        mock.extract("Extract the Name", b"abc").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].instruction, "Extract the Name");
        assert_eq!(calls[0].image_len, 3);
        assert_eq!(
            calls[0].image_digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mock = MockRequester::new().with_default_failure("service unavailable");
        let err = mock.extract("i", b"x").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_no_default_fails() {
        let mock = MockRequester::default();
        let err = mock.extract("i", b"x").await.unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
    }
}
