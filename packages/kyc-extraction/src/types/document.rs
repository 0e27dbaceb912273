//! Document kinds and the per-kind field policy.
//!
//! A policy decides which fields the model is asked for and how the
//! normalizer post-processes them: which field holds the holder's name, where
//! a second name line is promoted to, and which identifier gets canonicalized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::fields::is_space;

/// Identity document types the pipeline knows how to prompt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Indian Permanent Account Number card.
    #[default]
    Pan,
    /// Indian Aadhaar identity card.
    Aadhaar,
    /// Machine-readable passport data page.
    Passport,
    /// Any other photo identity document.
    Generic,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [Self::Pan, Self::Aadhaar, Self::Passport, Self::Generic];

    /// Short machine name (`pan`, `aadhaar`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pan => "pan",
            Self::Aadhaar => "aadhaar",
            Self::Passport => "passport",
            Self::Generic => "generic",
        }
    }

    /// Human label used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pan => "PAN card",
            Self::Aadhaar => "Aadhaar card",
            Self::Passport => "passport",
            Self::Generic => "identity document",
        }
    }

    /// The built-in policy for this kind.
    pub fn policy(&self) -> DocumentPolicy {
        DocumentPolicy::for_kind(*self)
    }

    /// Classify an uploaded file the way the upload endpoint does.
    ///
    /// Returns `None` for content types that are not accepted at all.
    pub fn classify(filename: &str, content_type: &str) -> Option<UploadClassification> {
        let content_type = content_type.trim().to_ascii_lowercase();
        match content_type.as_str() {
            "application/pdf" => return Some(UploadClassification::Pdf),
            "image/jpeg" | "image/jpg" | "image/png" => {}
            _ => return None,
        }

        let name = filename.to_lowercase();
        let kind = if name.contains("aadhaar") {
            Self::Aadhaar
        } else if name.contains("pan") {
            Self::Pan
        } else {
            Self::Generic
        };
        Some(UploadClassification::Document(kind))
    }

    /// Guess a kind from a file name alone, defaulting to [`DocumentKind::Pan`].
    pub fn infer_from_filename(filename: &str) -> Self {
        let name = filename.to_lowercase();
        if name.contains("aadhaar") {
            Self::Aadhaar
        } else if name.contains("passport") {
            Self::Passport
        } else {
            Self::Pan
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pan" => Ok(Self::Pan),
            "aadhaar" | "aadhar" => Ok(Self::Aadhaar),
            "passport" => Ok(Self::Passport),
            "generic" | "id" => Ok(Self::Generic),
            other => Err(format!(
                "unknown document kind '{other}' (expected pan, aadhaar, passport or generic)"
            )),
        }
    }
}

/// Outcome of classifying an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "kind", rename_all = "lowercase")]
pub enum UploadClassification {
    /// An image of the given document kind.
    Document(DocumentKind),
    /// A PDF; stored but not sent through the vision path.
    Pdf,
}

/// What happens when a two-line name meets an already populated target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePrecedence {
    /// The second name line replaces whatever the model put there.
    #[default]
    Overwrite,
    /// A non-empty existing value wins; the second line is dropped.
    KeepExisting,
}

/// How an identifier field is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Canonicalization {
    /// Remove all whitespace and upper-case (PAN, passport numbers).
    CompactUppercase,
    /// Remove all whitespace only (numeric identifiers).
    Compact,
}

impl Canonicalization {
    pub fn apply(&self, value: &str) -> String {
        let compact: String = value.chars().filter(|&c| !is_space(c)).collect();
        match self {
            Self::CompactUppercase => compact.to_uppercase(),
            Self::Compact => compact,
        }
    }
}

/// Identifier field plus its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRule {
    pub field: String,
    pub canonicalization: Canonicalization,
}

/// Per-document field policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPolicy {
    /// Which kind this policy was built for
    pub kind: DocumentKind,

    /// Field names requested from the model, in prompt order
    pub fields: Vec<String>,

    /// Field holding the holder's name (split on line breaks)
    pub name_field: Option<String>,

    /// Field a second name line is promoted into
    pub second_line_field: Option<String>,

    /// Precedence when the promotion target is already populated
    pub name_precedence: NamePrecedence,

    /// Identifier canonicalization, if the document carries one
    pub identifier: Option<IdentifierRule>,
}

impl DocumentPolicy {
    /// Built-in policy for a document kind.
    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Pan => Self::new(
                kind,
                ["Name", "Father's Name", "Date of Birth", "PAN Number"],
            )
            .with_name_field("Name")
            .with_second_line_field("Father's Name")
            .with_identifier("PAN Number", Canonicalization::CompactUppercase),
            DocumentKind::Aadhaar => Self::new(
                kind,
                ["Name", "Date of Birth", "Gender", "Aadhaar Number"],
            )
            .with_name_field("Name")
            .with_identifier("Aadhaar Number", Canonicalization::Compact),
            DocumentKind::Passport => Self::new(
                kind,
                [
                    "Name",
                    "Nationality",
                    "Date of Birth",
                    "Sex",
                    "Passport Number",
                    "Date of Expiry",
                ],
            )
            .with_name_field("Name")
            .with_identifier("Passport Number", Canonicalization::CompactUppercase),
            DocumentKind::Generic => Self::new(kind, ["Name", "Date of Birth", "Document Number"])
                .with_name_field("Name")
                .with_identifier("Document Number", Canonicalization::CompactUppercase),
        }
    }

    /// A policy with the given fields and no post-processing rules.
    pub fn new<I, S>(kind: DocumentKind, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            fields: fields.into_iter().map(Into::into).collect(),
            name_field: None,
            second_line_field: None,
            name_precedence: NamePrecedence::default(),
            identifier: None,
        }
    }

    /// Set the field that gets split on line breaks.
    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = Some(field.into());
        self
    }

    /// Set the field a second name line is promoted into.
    pub fn with_second_line_field(mut self, field: impl Into<String>) -> Self {
        self.second_line_field = Some(field.into());
        self
    }

    /// Set the precedence for the promoted second line.
    pub fn with_name_precedence(mut self, precedence: NamePrecedence) -> Self {
        self.name_precedence = precedence;
        self
    }

    /// Set the identifier field and its canonical form.
    pub fn with_identifier(
        mut self,
        field: impl Into<String>,
        canonicalization: Canonicalization,
    ) -> Self {
        self.identifier = Some(IdentifierRule {
            field: field.into(),
            canonicalization,
        });
        self
    }
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self::for_kind(DocumentKind::Pan)
    }
}
