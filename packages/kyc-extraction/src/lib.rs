//! Identity Document Field Extraction
//!
//! Turns a photographed KYC document into a clean field record in two steps:
//!
//! 1. **Request** - send the image (as a data URI) plus an instruction to a
//!    vision-capable chat model and take back its raw text.
//! 2. **Normalize** - locate the JSON object in that text, repair `\N`
//!    escapes, parse, trim, split two-line names and canonicalize the
//!    document identifier.
//!
//! Both steps are stateless. The request is the only I/O; normalization is a
//! pure function and can be replayed on captured model output.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kyc_extraction::{DocumentKind, KycExtractor, VisionConfig};
//! use kyc_extraction::ai::OpenAIRequester;
//!
//! let config = VisionConfig::from_env()?;
//! let requester = OpenAIRequester::from_config(&config);
//! let extractor = KycExtractor::new(requester, DocumentKind::Pan.policy())
//!     .with_timeout(config.timeout);
//!
//! let fields = extractor.extract_document(&image_bytes).await?;
//! println!("{:?}", fields.get_str("PAN Number"));
//!
//! // Replay captured output without a model
//! let fields = kyc_extraction::normalize(r#"{"Name": "Jane Doe\nJohn Doe"}"#)?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The requester abstraction
//! - [`types`] - Document policies, field records, configuration
//! - [`pipeline`] - Normalizer, prompts and the extractor
//! - [`ai`] - OpenAI-compatible requester (feature `openai`)
//! - [`testing`] - Mock requester for tests

pub mod error;
pub mod image;
pub mod pipeline;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{ExtractionError, MalformedData, Result};
pub use pipeline::{
    instruction, locate_object, normalize, repair_escapes, system_prompt, Extraction,
    KycExtractor, Normalizer, SpanStrategy, TimedOut,
};
pub use traits::requester::ExtractionRequester;
pub use types::{
    config::VisionConfig,
    document::{
        Canonicalization, DocumentKind, DocumentPolicy, IdentifierRule, NamePrecedence,
        UploadClassification,
    },
    fields::{ExtractedFields, RawModelOutput},
};
