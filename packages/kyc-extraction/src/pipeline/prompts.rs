//! Prompts for document field transcription.
//!
//! Both prompts are derived from the policy's field list so the key set the
//! model is told to emit always matches what the normalizer post-processes.

use crate::types::document::DocumentPolicy;

/// System turn: pins the assistant to JSON-only output with a fixed key set.
pub fn system_prompt(policy: &DocumentPolicy) -> String {
    format!(
        "You are a careful OCR assistant for {label} images. \
         Return ONLY a valid JSON object with exactly these keys: {keys}. \
         Use an empty string for any field you cannot read. \
         Do not add commentary or markdown fences.",
        label = policy.kind.label(),
        keys = quoted_list(&policy.fields),
    )
}

/// User turn instruction: names the fields and shows the exact JSON shape.
pub fn instruction(policy: &DocumentPolicy) -> String {
    format!(
        "Extract the {fields} from the image. \
         Return ONLY a JSON object exactly in this format: {template}",
        fields = english_list(&policy.fields),
        template = json_template(&policy.fields),
    )
}

/// `{ "Name": "...", "PAN Number": "..." }`
pub fn json_template(fields: &[String]) -> String {
    let entries: Vec<String> = fields
        .iter()
        .map(|field| format!("{}: \"...\"", serde_json::Value::String(field.clone())))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

fn quoted_list(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn english_list(fields: &[String]) -> String {
    match fields {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::DocumentKind;

    #[test]
    fn test_pan_instruction() {
        let text = instruction(&DocumentKind::Pan.policy());
        assert_eq!(
            text,
            "Extract the Name, Father's Name, Date of Birth, and PAN Number from the image. \
             Return ONLY a JSON object exactly in this format: \
             { \"Name\": \"...\", \"Father's Name\": \"...\", \"Date of Birth\": \"...\", \"PAN Number\": \"...\" }"
        );
    }

    #[test]
    fn test_template_is_valid_json() {
        for kind in DocumentKind::ALL {
            let policy = kind.policy();
            let template = json_template(&policy.fields);
            let parsed: serde_json::Value = serde_json::from_str(&template).unwrap();
            assert_eq!(parsed.as_object().unwrap().len(), policy.fields.len());
        }
    }

    #[test]
    fn test_system_prompt_lists_keys() {
        let prompt = system_prompt(&DocumentKind::Aadhaar.policy());
        assert!(prompt.contains("Aadhaar card"));
        assert!(prompt.contains("\"Aadhaar Number\""));
        assert!(prompt.starts_with("You are a careful OCR assistant"));
    }

    #[test]
    fn test_english_list() {
        let fields = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(english_list(&[]), "");
        assert_eq!(english_list(&fields(&["A"][..])), "A");
        assert_eq!(english_list(&fields(&["A", "B"][..])), "A and B");
        assert_eq!(english_list(&fields(&["A", "B", "C"][..])), "A, B, and C");
    }
}
