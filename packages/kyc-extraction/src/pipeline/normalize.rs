//! Recover a field record from free-form model output.
//!
//! Vision models are asked for bare JSON but routinely wrap it in prose or
//! markdown fences, emit `\N` for `\n`, pad values with whitespace, and put
//! two people's names on one field. The normalizer tolerates that noise:
//!
//! 1. locate the JSON object span
//! 2. rewrite literal `\N` to `\n`
//! 3. parse (a failure here is terminal)
//! 4. trim every top-level string value
//! 5. split the name field on line breaks, promoting a second line
//! 6. canonicalize the identifier field
//!
//! No I/O; the same input always yields the same output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ExtractionError, MalformedData, Result};
use crate::types::document::{DocumentKind, DocumentPolicy, NamePrecedence};
use crate::types::fields::{is_space, ExtractedFields};

/// How the JSON object span is located in the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStrategy {
    /// Leftmost `{` through rightmost `}`.
    #[default]
    Greedy,
    /// Leftmost `{` through its matching `}`, ignoring braces inside strings.
    ///
    /// Falls back to [`SpanStrategy::Greedy`] when the first object never closes.
    Balanced,
}

/// Normalizes raw model output under a document policy.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: DocumentPolicy,
    span: SpanStrategy,
}

impl Normalizer {
    pub fn new(policy: DocumentPolicy) -> Self {
        Self {
            policy,
            span: SpanStrategy::default(),
        }
    }

    /// Normalizer using the built-in policy for `kind`.
    pub fn for_kind(kind: DocumentKind) -> Self {
        Self::new(kind.policy())
    }

    pub fn with_span_strategy(mut self, span: SpanStrategy) -> Self {
        self.span = span;
        self
    }

    pub fn policy(&self) -> &DocumentPolicy {
        &self.policy
    }

    pub fn span_strategy(&self) -> SpanStrategy {
        self.span
    }

    /// Parse and clean raw model output.
    ///
    /// Fails with [`ExtractionError::NoStructuredDataFound`] when there is no
    /// `{...}` span, or [`ExtractionError::MalformedStructuredData`] when the
    /// span is not a JSON object even after escape repair.
    pub fn normalize(&self, raw: &str) -> Result<ExtractedFields> {
        let span = locate_object(raw, self.span).ok_or_else(|| {
            debug!(raw_len = raw.len(), "no JSON object in model output");
            ExtractionError::NoStructuredDataFound
        })?;

        let repaired = repair_escapes(span);
        let mut map = match serde_json::from_str::<Value>(&repaired)? {
            Value::Object(map) => map,
            other => {
                return Err(ExtractionError::MalformedStructuredData(
                    MalformedData::NotAnObject {
                        found: value_kind(&other),
                    },
                ))
            }
        };

        trim_strings(&mut map);
        self.decompose_name(&mut map);
        self.canonicalize_identifier(&mut map);

        debug!(
            kind = %self.policy.kind,
            fields = map.len(),
            "normalized model output"
        );

        Ok(ExtractedFields::from_map(map))
    }

    fn decompose_name(&self, map: &mut Map<String, Value>) {
        let Some(name_field) = self.policy.name_field.as_deref() else {
            return;
        };

        let lines: Vec<String> = match map.get(name_field) {
            Some(Value::String(name)) if !name.is_empty() => split_lines(name)
                .map(|line| line.trim_matches(is_space))
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            _ => return,
        };

        let mut lines = lines.into_iter();
        if let Some(first) = lines.next() {
            map.insert(name_field.to_string(), Value::String(first));
        }

        let (Some(second), Some(target)) = (lines.next(), self.policy.second_line_field.as_deref())
        else {
            return;
        };

        let occupied = match map.get(target) {
            None | Some(Value::Null) => false,
            Some(Value::String(existing)) => !existing.is_empty(),
            Some(_) => true,
        };
        match self.policy.name_precedence {
            NamePrecedence::Overwrite => {
                map.insert(target.to_string(), Value::String(second));
            }
            NamePrecedence::KeepExisting if !occupied => {
                map.insert(target.to_string(), Value::String(second));
            }
            NamePrecedence::KeepExisting => {
                debug!(field = target, "keeping existing value over second name line");
            }
        }
    }

    fn canonicalize_identifier(&self, map: &mut Map<String, Value>) {
        let Some(rule) = &self.policy.identifier else {
            return;
        };
        if let Some(Value::String(id)) = map.get_mut(&rule.field) {
            if !id.is_empty() {
                *id = rule.canonicalization.apply(id);
            }
        }
    }
}

/// Normalize with the PAN card policy and greedy span location.
pub fn normalize(raw: &str) -> Result<ExtractedFields> {
    Normalizer::default().normalize(raw)
}

/// Find the candidate JSON object inside `raw`.
pub fn locate_object(raw: &str, strategy: SpanStrategy) -> Option<&str> {
    match strategy {
        SpanStrategy::Greedy => greedy_span(raw),
        SpanStrategy::Balanced => balanced_span(raw).or_else(|| greedy_span(raw)),
    }
}

fn greedy_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn balanced_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset;
                    return Some(&raw[start..=end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrite the literal two-character sequence `\N` as `\n`.
pub fn repair_escapes(span: &str) -> String {
    span.replace("\\N", "\\n")
}

fn trim_strings(map: &mut Map<String, Value>) {
    for value in map.values_mut() {
        if let Value::String(s) = value {
            let trimmed = s.trim_matches(is_space);
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }
}

/// Split on every Unicode line boundary (`\n`, `\r\n`, `\r`, VT, FF, FS, GS,
/// RS, NEL, LS, PS). `\r\n` yields an empty piece, which callers discard.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| {
        matches!(
            c,
            '\n' | '\r'
                | '\u{0B}'
                | '\u{0C}'
                | '\u{1C}'
                | '\u{1D}'
                | '\u{1E}'
                | '\u{85}'
                | '\u{2028}'
                | '\u{2029}'
        )
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_two_line_name_and_pan_cleanup() {
        let fields =
            normalize(r#"{"Name": "Jane Doe\nJohn Doe", "PAN Number": " ab cd1234 e "}"#).unwrap();

        assert_eq!(fields.get_str("Name"), Some("Jane Doe"));
        assert_eq!(fields.get_str("Father's Name"), Some("John Doe"));
        assert_eq!(fields.get_str("PAN Number"), Some("ABCD1234E"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_prose_and_fences_are_ignored() {
        let raw = "Here is the result:\n```json\n{\"Name\": \"A\", \"PAN Number\": \"x\"}\n```\nThanks!";
        let fields = normalize(raw).unwrap();

        assert_eq!(fields.to_json(), json!({ "Name": "A", "PAN Number": "X" }));
    }

    #[test]
    fn test_uppercase_n_escape_is_repaired() {
        let raw = r#"{"Name": "Jane Doe\NJohn Doe"}"#;
        assert!(serde_json::from_str::<Value>(raw).is_err());

        let fields = normalize(raw).unwrap();
        assert_eq!(fields.get_str("Name"), Some("Jane Doe"));
        assert_eq!(fields.get_str("Father's Name"), Some("John Doe"));
    }

    #[test]
    fn test_information_separators_are_trimmed() {
        let fields = normalize(
            r#"{"Name": "\u001fJane\u001f", "Date of Birth": "\u001c01/02/1990\u00a0", "PAN Number": "ab\u001dc"}"#,
        )
        .unwrap();

        assert_eq!(fields.get_str("Name"), Some("Jane"));
        assert_eq!(fields.get_str("Date of Birth"), Some("01/02/1990"));
        assert_eq!(fields.get_str("PAN Number"), Some("ABC"));
    }

    #[test]
    fn test_no_brace_is_no_structured_data() {
        let err = normalize("I could not read the card, sorry.").unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructuredDataFound));
    }

    #[test]
    fn test_close_before_open_is_no_structured_data() {
        let err = normalize("} nothing here {").unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructuredDataFound));
    }

    #[test]
    fn test_trailing_comma_is_malformed() {
        let err = normalize(r#"{"Name": "A",}"#).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MalformedStructuredData(MalformedData::Json(_))
        ));
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let fields = normalize(r#"{"Name": "A"}"#).unwrap();
        assert!(!fields.contains("PAN Number"));
        assert!(!fields.contains("Father's Name"));
        assert!(!fields.contains("Date of Birth"));
    }

    #[test]
    fn test_non_string_values_pass_through() {
        let fields = normalize(r#"{"Name": " A ", "Confidence": 0.9, "Extra": null, "Tags": [" x "]}"#)
            .unwrap();
        assert_eq!(fields.get_str("Name"), Some("A"));
        assert_eq!(fields.get("Confidence"), Some(&json!(0.9)));
        assert_eq!(fields.get("Extra"), Some(&Value::Null));
        assert_eq!(fields.get("Tags"), Some(&json!([" x "])));
    }

    #[test]
    fn test_second_line_overwrites_by_default() {
        let fields = normalize(r#"{"Name": "Jane\nJohn", "Father's Name": "Someone Else"}"#).unwrap();
        assert_eq!(fields.get_str("Father's Name"), Some("John"));
    }

    #[test]
    fn test_keep_existing_precedence() {
        let policy = DocumentPolicy::default().with_name_precedence(NamePrecedence::KeepExisting);
        let normalizer = Normalizer::new(policy);

        let fields = normalizer
            .normalize(r#"{"Name": "Jane\nJohn", "Father's Name": "Someone Else"}"#)
            .unwrap();
        assert_eq!(fields.get_str("Name"), Some("Jane"));
        assert_eq!(fields.get_str("Father's Name"), Some("Someone Else"));

        let fields = normalizer
            .normalize(r#"{"Name": "Jane\nJohn", "Father's Name": "  "}"#)
            .unwrap();
        assert_eq!(fields.get_str("Father's Name"), Some("John"));
    }

    #[test]
    fn test_single_line_name_untouched_and_father_kept() {
        let fields = normalize(r#"{"Name": " Jane ", "Father's Name": "John"}"#).unwrap();
        assert_eq!(fields.get_str("Name"), Some("Jane"));
        assert_eq!(fields.get_str("Father's Name"), Some("John"));
    }

    #[test]
    fn test_blank_lines_and_crlf_in_name() {
        let fields = normalize("{\"Name\": \"\\r\\n  Jane \\r\\n\\r\\n John \\n Third\"}").unwrap();
        assert_eq!(fields.get_str("Name"), Some("Jane"));
        assert_eq!(fields.get_str("Father's Name"), Some("John"));
    }

    #[test]
    fn test_empty_name_and_pan_left_alone() {
        let fields = normalize(r#"{"Name": "", "PAN Number": "   "}"#).unwrap();
        assert_eq!(fields.get_str("Name"), Some(""));
        assert_eq!(fields.get_str("PAN Number"), Some(""));
        assert!(!fields.contains("Father's Name"));
    }

    #[test]
    fn test_non_string_pan_is_not_touched() {
        let fields = normalize(r#"{"PAN Number": 12345}"#).unwrap();
        assert_eq!(fields.get("PAN Number"), Some(&json!(12345)));
    }

    #[test]
    fn test_nested_braces_kept_by_greedy_span() {
        let raw = r#"Result: {"Name": "A", "Meta": {"side": "front"}} done"#;
        let fields = normalize(raw).unwrap();
        assert_eq!(fields.get("Meta"), Some(&json!({ "side": "front" })));
    }

    #[test]
    fn test_stray_trailing_brace_breaks_greedy_but_not_balanced() {
        let raw = r#"{"Name": "A"} (fields wrapped in {})"#;
        assert!(matches!(
            normalize(raw).unwrap_err(),
            ExtractionError::MalformedStructuredData(_)
        ));

        let fields = Normalizer::default()
            .with_span_strategy(SpanStrategy::Balanced)
            .normalize(raw)
            .unwrap();
        assert_eq!(fields.get_str("Name"), Some("A"));
    }

    #[test]
    fn test_balanced_span_ignores_braces_in_strings() {
        let raw = r#"{"Name": "A } B", "Note": "{\"x\"}"} trailing }"#;
        assert_eq!(
            locate_object(raw, SpanStrategy::Balanced),
            Some(r#"{"Name": "A } B", "Note": "{\"x\"}"}"#)
        );
    }

    #[test]
    fn test_balanced_falls_back_when_unclosed() {
        let raw = r#"{"Name": "A" } {"#;
        assert_eq!(locate_object(raw, SpanStrategy::Balanced), Some(r#"{"Name": "A" }"#));
        let raw = r#"{ "a": { "b": 1 }"#;
        assert_eq!(
            locate_object(raw, SpanStrategy::Balanced),
            locate_object(raw, SpanStrategy::Greedy)
        );
    }

    #[test]
    fn test_aadhaar_policy_compacts_without_promotion() {
        let normalizer = Normalizer::for_kind(DocumentKind::Aadhaar);
        let fields = normalizer
            .normalize(r#"{"Name": "Asha Rao\nS/O Rao", "Aadhaar Number": "1234 5678 9012"}"#)
            .unwrap();

        assert_eq!(fields.get_str("Name"), Some("Asha Rao"));
        assert_eq!(fields.get_str("Aadhaar Number"), Some("123456789012"));
        assert!(!fields.contains("Father's Name"));
    }

    #[test]
    fn test_passport_number_uppercased() {
        let fields = Normalizer::for_kind(DocumentKind::Passport)
            .normalize(r#"{"Passport Number": " k 1234567 ", "PAN Number": "ab c"}"#)
            .unwrap();
        assert_eq!(fields.get_str("Passport Number"), Some("K1234567"));
        // only the policy's identifier is canonicalized
        assert_eq!(fields.get_str("PAN Number"), Some("ab c"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = "noise {\"Name\": \"Jane\\nJohn\", \"PAN Number\": \"ab 12\"} noise";
        assert_eq!(normalize(raw).unwrap(), normalize(raw).unwrap());
    }

    #[test]
    fn test_key_order_preserved() {
        let fields = normalize(r#"{"PAN Number": "x", "Date of Birth": "01/01/1990", "Name": "A\nB"}"#)
            .unwrap();
        let names: Vec<&str> = fields.field_names().collect();
        assert_eq!(names, vec!["PAN Number", "Date of Birth", "Name", "Father's Name"]);
    }
}
