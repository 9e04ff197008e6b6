//! Decoding model text into a key/value payload
//!
//! Models wrap JSON in prose or Markdown fences often enough that a plain
//! parse is not sufficient. Decoding tries, in order: the whole text, the
//! text inside a code fence, and the outermost `{...}` span. The first
//! candidate that parses as a JSON object wins.

use serde_json::Value;

/// Decode model text into a payload
///
/// Returns the text itself as a JSON string when no object can be found,
/// which the engine's validator treats as malformed output.
pub fn decode_payload(text: &str) -> Value {
    let trimmed = text.trim();

    [Some(trimmed), fenced(trimmed), braced(trimmed)]
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        })
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}

/// Contents of the first Markdown code fence
fn fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an info string such as `json`.
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Outermost brace-delimited span
fn braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
