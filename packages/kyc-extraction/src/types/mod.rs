//! Data types for the KYC extraction library.

pub mod config;
pub mod document;
pub mod fields;
