//! Recover a JSON value from free-form model output.
//!
//! Models wrap structured answers in prose, reasoning blocks or markdown fences.
//! Extraction tries, in order: the untouched (trimmed) text, `<solution>` tags,
//! the text with think blocks removed, the first ```` ```json ```` fence, then
//! the first generic fence.

use serde_json::Value;

/// Why no JSON value could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no JSON value found in model output ({tried})")]
pub struct ExtractError {
    /// Human-readable list of the strategies that were attempted.
    pub tried: String,
}

/// Extract the first parseable JSON value from `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let mut tried = vec!["direct parse"];
    if let Ok(v) = serde_json::from_str(text.trim()) {
        return Ok(v);
    }

    let cleaned = strip_think_blocks(text);

    if let Some(inner) = between(&cleaned, "<solution>", "</solution>") {
        tried.push("solution tags");
        if let Ok(v) = serde_json::from_str(inner.trim()) {
            return Ok(v);
        }
    }

    tried.push("think-stripped parse");
    if let Ok(v) = serde_json::from_str(cleaned.trim()) {
        return Ok(v);
    }

    if let Some(inner) = between(&cleaned, "```json", "```") {
        tried.push("json fence");
        if let Ok(v) = serde_json::from_str(inner.trim()) {
            return Ok(v);
        }
    }

    if let Some(inner) = generic_fence(&cleaned) {
        tried.push("generic fence");
        if let Ok(v) = serde_json::from_str(inner.trim()) {
            return Ok(v);
        }
    }

    Err(ExtractError {
        tried: tried.join(", "),
    })
}

/// Strip `<think>...</think>` blocks that some models (qwen3, deepseek) emit.
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            // Unclosed think block: drop everything from <think> onward
            result.truncate(start);
            break;
        }
    }
    result
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)?;
    Some(&text[start..start + end])
}

/// Contents of the first ``` fence, skipping an info string on the opening line.
fn generic_fence(text: &str) -> Option<&str> {
    let inner = between(text, "```", "```")?;
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with(['{', '[']) => Some(body),
        _ => Some(inner),
    }
}
