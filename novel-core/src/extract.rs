//! Pulling JSON payloads out of model prose.
//!
//! Models are prompted to answer with bare JSON, but they routinely wrap
//! it in a markdown fence or preface it with chatter. `extract_json` finds
//! the payload wherever it landed; `parse_json` deserializes it.

use serde::de::DeserializeOwned;

/// Locate the JSON document inside a model reply.
///
/// Tries, in order: a ```json fence, any ``` fence, then the first
/// balanced `{...}` or `[...]` span in the raw text. Returns the
/// trimmed payload, or `None` when nothing JSON-shaped is present.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(fenced) = extract_fenced(text, "```json") {
        return Some(fenced);
    }
    if let Some(fenced) = extract_fenced(text, "```") {
        return Some(fenced);
    }
    extract_balanced(text)
}

/// Extract and deserialize in one step, with the raw payload preserved
/// in the error message when deserialization fails.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let payload = extract_json(text)
        .ok_or_else(|| format!("no JSON found in model output: {}", truncate(text, 200)))?;
    serde_json::from_str(payload)
        .map_err(|e| format!("malformed JSON in model output: {e}: {}", truncate(payload, 200)))
}

fn extract_fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    // Skip the remainder of the opening fence line
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First balanced brace or bracket span, respecting string literals
/// and escapes so a `}` inside a quoted value does not end the scan.
fn extract_balanced(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let (open_ch, close_ch) = if bytes[open] == b'{' {
        (b'{', b'}')
    } else {
        (b'[', b']')
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes[open..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open_ch => depth += 1,
            _ if b == close_ch => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[open..open + i + 1].trim());
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
