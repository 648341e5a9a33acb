//! Tolerant JSON extraction for model output.
//!
//! Stage responses arrive as prose that should contain a single JSON
//! object. The parse boundary scans from the first `{` to the last `}`,
//! parses that slice, and lets each stage fall back to its documented
//! default on any failure instead of propagating a parse error.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extract the JSON object embedded in free text, tolerating surrounding prose.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Extract and deserialize a stage payload in one step.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = extract_json_object(text)?;
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_extract_plain_object() {
        let value = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_with_surrounding_prose() {
        let text = "Here is the plan you asked for:\n{\"queries\": [\"q1\"]}\nHope that helps!";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["queries"][0], "q1");
    }

    #[test]
    fn test_extract_code_fence() {
        let text = "```json\n{\"supported\": true}\n```";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["supported"], true);
    }

    #[test]
    fn test_no_object_returns_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }

    #[test]
    fn test_malformed_object_returns_none() {
        assert!(extract_json_object("{not valid json}").is_none());
    }

    #[test]
    fn test_parse_payload_typed() {
        #[derive(Deserialize)]
        struct Probe {
            count: usize,
        }
        let probe: Probe = parse_payload("result: {\"count\": 4}").unwrap();
        assert_eq!(probe.count, 4);

        let missing: Option<Probe> = parse_payload("{\"other\": 1}");
        assert!(missing.is_none());
    }
}
