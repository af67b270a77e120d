//! Default type conversion service.

use serde_json::Value;

use crate::contracts::TypeConvertibleService;
use crate::error::ProxyResult;
use crate::message::ReturnType;

/// Passes payloads through, except that a JSON object or array transported
/// as a string is parsed when the caller expects a structured type.
///
/// Scalar-looking text (`"42"`, `"true"`, `"null"`) is never reinterpreted,
/// so text-like targets such as `Option<String>` keep their value. String
/// and raw (`serde_json::Value`) targets always receive the payload
/// unchanged, as does text that is not valid JSON; the final decode reports
/// whether it fits the caller's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTypeConverter;

impl TypeConvertibleService for JsonTypeConverter {
    fn convert(&self, value: Value, target: &ReturnType) -> ProxyResult<Value> {
        match value {
            Value::String(text) if parses_into(target) && is_document(&text) => {
                Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            }
            other => Ok(other),
        }
    }
}

fn parses_into(target: &ReturnType) -> bool {
    !target.is_string() && !target.is_raw() && !target.is_unit()
}

fn is_document(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{' | b'['))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(serde::Deserialize)]
    struct Order {
        #[allow(dead_code)]
        id: u64,
    }

    #[test]
    fn structured_values_pass_through() {
        let out = JsonTypeConverter
            .convert(json!({"id": 1}), &ReturnType::of::<Order>())
            .unwrap();
        assert_eq!(out, json!({"id": 1}));
    }

    #[test]
    fn json_text_is_parsed_for_structured_targets() {
        let out = JsonTypeConverter
            .convert(json!(r#"{"id":1,"total":9.99}"#), &ReturnType::of::<Order>())
            .unwrap();
        assert_eq!(out, json!({"id": 1, "total": 9.99}));

        let out = JsonTypeConverter
            .convert(json!(" [1, 2]"), &ReturnType::of::<Vec<u32>>())
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[test]
    fn scalar_text_is_never_reinterpreted() {
        for text in ["42", "true", "null", "\"quoted\""] {
            let out = JsonTypeConverter
                .convert(json!(text), &ReturnType::of::<Option<String>>())
                .unwrap();
            assert_eq!(out, json!(text));
            assert_eq!(
                serde_json::from_value::<Option<String>>(out).unwrap().as_deref(),
                Some(text)
            );
        }

        let out = JsonTypeConverter
            .convert(json!("42"), &ReturnType::of::<u32>())
            .unwrap();
        assert_eq!(out, json!("42"));
    }

    #[test]
    fn strings_and_raw_targets_are_untouched() {
        let out = JsonTypeConverter
            .convert(json!("42"), &ReturnType::of::<String>())
            .unwrap();
        assert_eq!(out, json!("42"));

        let out = JsonTypeConverter
            .convert(json!("{not json"), &ReturnType::of::<Value>())
            .unwrap();
        assert_eq!(out, json!("{not json"));
    }

    #[test]
    fn plain_text_survives_for_optional_strings() {
        let out = JsonTypeConverter
            .convert(json!("pending"), &ReturnType::of::<Option<String>>())
            .unwrap();
        assert_eq!(out, json!("pending"));
    }
}
