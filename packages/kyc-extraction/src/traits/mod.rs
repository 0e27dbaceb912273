//! Core trait abstractions for the KYC extraction library.

pub mod requester;
