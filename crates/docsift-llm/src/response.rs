//! Normalize provider completion text into structured content

use docsift_domain::ProviderFailure;
use serde_json::Value;

/// Parse completion text into JSON content
///
/// LLMs sometimes wrap JSON in markdown code blocks; those are stripped
/// before parsing. Unparseable content classifies as `MalformedResponse`.
pub(crate) fn parse_content(text: &str) -> Result<Value, ProviderFailure> {
    let json_str = strip_fences(text)?;

    serde_json::from_str(&json_str)
        .map_err(|e| ProviderFailure::malformed(format!("JSON parse error: {}", e)))
}

/// Strip a markdown code fence, if present
fn strip_fences(text: &str) -> Result<String, ProviderFailure> {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ProviderFailure::malformed("Empty code block"));
        }

        // Skip first line (```json or ```) and last line (```)
        let json_lines = &lines[1..lines.len().saturating_sub(1)];
        Ok(json_lines.join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}
