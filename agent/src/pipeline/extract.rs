use serde_json::Value;
use thiserror::Error;

/// No parseable JSON anywhere in the response. Keeps the raw text so the
/// corrective prompt can quote it back to the model.
#[derive(Debug, Error)]
#[error("no JSON payload found in response")]
pub struct ExtractionFailure {
    pub raw: String,
}

/// Pull a JSON object out of arbitrary LLM text. Tries, in order:
/// the whole text, the first fenced code block, the first balanced-brace
/// span. Parse errors never escape this boundary.
pub fn extract(raw: &str) -> Result<Value, ExtractionFailure> {
    let trimmed = raw.trim();

    if let Some(v) = parse_object(trimmed) {
        return Ok(v);
    }
    if let Some(block) = fenced_block(trimmed) {
        if let Some(v) = parse_object(block) {
            return Ok(v);
        }
    }
    if let Some(span) = brace_span(trimmed) {
        if let Some(v) = parse_object(span) {
            return Ok(v);
        }
    }

    Err(ExtractionFailure {
        raw: raw.to_string(),
    })
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(v) if v.is_object() => Some(v),
        _ => None,
    }
}

/// Contents of the first triple-backtick fence, with an optional `json` tag
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

/// First top-level `{...}` span found by balanced-brace scanning
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
