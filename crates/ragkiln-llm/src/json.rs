//! Regex-based JSON recovery for LLM responses that wrap valid JSON in
//! prose or markdown code fences.

/// Strips a leading/trailing ```json ... ``` or ``` ... ``` fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Regex-extracts the outermost `[...]` substring, used when a direct
/// `serde_json::from_str` of the full response fails.
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_outermost(text, '[', ']')
}

pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_outermost(text, '{', '}')
}

fn extract_outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parses a JSON array of topics, recovering via fence-stripping and
/// outermost-bracket extraction if the direct parse fails. Returns `None`
/// (never an error) on persistent failure, "return an empty
/// list and log a warning (non-fatal)".
pub fn parse_json_array_lenient(raw: &str) -> Option<serde_json::Value> {
    let candidates = [raw, strip_code_fence(raw)];
    for candidate in candidates {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if value.is_array() {
                return Some(value);
            }
        }
    }
    let extracted = extract_json_array(strip_code_fence(raw))?;
    serde_json::from_str(extracted)
        .ok()
        .filter(serde_json::Value::is_array)
}

pub fn parse_json_object_lenient(raw: &str) -> Option<serde_json::Value> {
    let stripped = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stripped) {
        if value.is_object() {
            return Some(value);
        }
    }
    let extracted = extract_json_object(stripped)?;
    serde_json::from_str(extracted)
        .ok()
        .filter(serde_json::Value::is_object)
}
