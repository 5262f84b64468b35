//! Robust JSON parsing of LLM output (spec §4.3): strip code fences/prose,
//! parse; on failure extract the first balanced `{...}`/`[...]` substring
//! and retry; on total failure the caller substitutes its configured
//! default — this module never panics and never fails loudly.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

/// Strip a single fenced code block if present, otherwise return the input
/// trimmed.
fn strip_fences(raw: &str) -> String {
    if let Some(caps) = CODE_FENCE.captures(raw) {
        return caps[1].trim().to_string();
    }
    raw.trim().to_string()
}

/// Scan for the first balanced `{...}` or `[...]` substring, respecting
/// quoted strings so braces inside string literals don't throw off the
/// count.
fn extract_balanced(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let open_positions: Vec<usize> =
        bytes.iter().enumerate().filter(|(_, b)| **b == b'{' || **b == b'[').map(|(i, _)| i).collect();

    for start in open_positions {
        let opener = bytes[start];
        let closer = if opener == b'{' { b'}' } else { b']' };
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &byte) in bytes[start..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b if b == opener => depth += 1,
                b if b == closer => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        return Some(raw[start..end].to_string());
                    }
                },
                _ => {},
            }
        }
    }
    None
}

/// Full recovery chain. Returns `None` only when every step fails, at
/// which point the caller substitutes its configured default.
pub fn recover_json(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_fences(raw);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Some(value);
    }
    let extracted = extract_balanced(&cleaned).or_else(|| extract_balanced(raw))?;
    serde_json::from_str(&extracted).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_json_directly() {
        let result = recover_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        let result = recover_json(raw).unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn extracts_balanced_braces_from_surrounding_prose() {
        let raw = "Sure, here you go: {\"a\": 1} Hope that helps!";
        let result = recover_json(raw).unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn extracts_balanced_brackets() {
        let raw = "the keywords are [\"a\", \"b\"] as requested";
        let result = recover_json(raw).unwrap();
        assert_eq!(result, json!(["a", "b"]));
    }

    #[test]
    fn ignores_braces_inside_string_literals() {
        let raw = r#"prefix {"text": "a { b } c", "n": 2} suffix"#;
        let result = recover_json(raw).unwrap();
        assert_eq!(result, json!({"text": "a { b } c", "n": 2}));
    }

    #[test]
    fn returns_none_for_total_garbage() {
        assert!(recover_json("not json at all, sorry").is_none());
    }
}
