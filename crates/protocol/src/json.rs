//! Extraction of the first balanced `{...}` span from a free-text reply.
//!
//! Structuring replies are allowed to wrap their JSON payload in prose or
//! markdown fences; only the first balanced object span is parsed.

use anyhow::{anyhow, Result};

/// Locate the first balanced top-level JSON object in `reply`.
///
/// Brace counting is string- and escape-aware so braces inside string
/// literals do not unbalance the span. Returns an error when no opening
/// brace exists or the span never closes.
pub fn extract_json_object(reply: &str) -> Result<&str> {
    let start = reply
        .find('{')
        .ok_or_else(|| anyhow!("no JSON object found in reply"))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in reply[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&reply[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(anyhow!("unterminated JSON object in reply"))
}

/// Extract and parse the first balanced object span as `T`.
pub fn parse_embedded<T: for<'de> serde::Deserialize<'de>>(reply: &str) -> Result<T> {
    let span = extract_json_object(reply)?;
    serde_json::from_str(span).map_err(|err| anyhow!("invalid JSON payload: {err}"))
}
