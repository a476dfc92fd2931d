//! Normalization Strategies
//!
//! Pure text transforms used by the response normalizer, each testable on
//! its own. Handles common model output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - JSON embedded in explanatory text
//! - Literal newlines/tabs and control bytes inside string values

use serde_json::Value;

/// Strategy 1: parse the text as-is
pub fn parse_direct(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Strategy 2: strip leading/trailing code fences
///
/// Returns `None` when the text carries no fence markers.
pub fn strip_code_fences(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let mut body = trimmed;
    let mut stripped = false;

    if let Some(rest) = body.strip_prefix("```") {
        // Optional language tag: ```json, ```JSON5, ```js-object
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
        stripped = true;
    }

    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
        stripped = true;
    }

    stripped.then(|| body.trim().to_string())
}

/// Strategy 3: first balanced top-level `{...}` substring
///
/// String literals are tracked so braces inside values don't count.
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Strategy 4: escape literal newlines/tabs inside strings, drop other control bytes
pub fn sanitize_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escape = false;

    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
                match ch {
                    '\n' => out.push('n'),
                    '\r' => out.push('r'),
                    '\t' => out.push('t'),
                    c => out.push(c),
                }
                continue;
            }

            match ch {
                '\\' => {
                    escape = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
        } else {
            match ch {
                '"' => {
                    in_string = true;
                    out.push(ch);
                }
                '\n' | '\r' | '\t' => out.push(ch),
                c if c.is_control() => {}
                c => out.push(c),
            }
        }
    }

    out
}
