//! Requester implementations for vision model providers.

pub mod openai;

pub use openai::{OpenAIRequester, DEFAULT_SYSTEM_PROMPT};
