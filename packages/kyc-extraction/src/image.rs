//! Inline image encoding for multimodal requests.

use base64::{engine::general_purpose::STANDARD, Engine};

/// Media type declared when the bytes match no known signature.
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Detect an image media type from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

/// Encode image bytes as a `data:<mime>;base64,<payload>` URI.
pub fn to_data_uri(bytes: &[u8]) -> String {
    let mime = sniff_mime(bytes).unwrap_or(FALLBACK_MIME);
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
