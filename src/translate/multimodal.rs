//! Image attachments to OpenAI content parts.

use crate::types::upstream::{ContentPart, MessageContent};
use base64::Engine as _;
use serde_json::Value;
use tracing::warn;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Builds message content from text plus raw image entries.
///
/// No images yields plain text. Otherwise a text part (only if `text` is
/// non-empty) is followed by one image part per valid image. Entries that are
/// not non-empty strings are skipped; if none survive, the result is plain text.
pub fn build_content(text: &str, images: &[Value]) -> MessageContent {
    if images.is_empty() {
        return MessageContent::Text(text.to_string());
    }

    let image_parts: Vec<ContentPart> = images
        .iter()
        .enumerate()
        .filter_map(|(i, img)| match img {
            Value::String(s) if !s.trim().is_empty() => Some(ContentPart::image_url(to_image_url(s))),
            other => {
                warn!(index = i, kind = value_kind(other), "skipping invalid image entry");
                None
            }
        })
        .collect();

    if image_parts.is_empty() {
        return MessageContent::Text(text.to_string());
    }

    let mut parts = Vec::with_capacity(image_parts.len() + 1);
    if !text.is_empty() {
        parts.push(ContentPart::text(text));
    }
    parts.extend(image_parts);
    MessageContent::Parts(parts)
}

/// Turns an image entry into a URL the upstream accepts.
///
/// `data:` and `http(s)` URLs are kept as-is; bare base64 is wrapped in a
/// `data:` URL whose MIME type is sniffed from the decoded header bytes.
pub fn to_image_url(image: &str) -> String {
    let image = image.trim();
    if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://") {
        return image.to_string();
    }
    format!("data:{};base64,{}", sniff_mime(image), image)
}

/// Best-effort MIME detection from the first bytes of a base64 payload.
pub fn sniff_mime(b64: &str) -> &'static str {
    // 16 base64 chars decode to 12 bytes, enough for every signature below.
    let head: String = b64.chars().filter(|c| !c.is_whitespace()).take(16).collect();
    if head.len() < 16 {
        return DEFAULT_IMAGE_MIME;
    }
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(head.as_bytes()) else {
        return DEFAULT_IMAGE_MIME;
    };
    match bytes.as_slice() {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        _ => DEFAULT_IMAGE_MIME,
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "empty string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
