//! Serialization Codec
//!
//! Converts values to and from the integrity-checked wire form
//! `"<len>|<json>"`, where `len` is the UTF-16 length of `json`. A record
//! whose prefix disagrees with its payload is treated as corrupted.

use serde::Serialize;
use serde_json::Value;

use crate::backend::storage_units;

/// Separates the length prefix from the payload.
pub const LENGTH_DELIMITER: char = '|';

// == Serialize ==
/// Encodes `value` as JSON and prefixes it with its own length.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let payload = serde_json::to_string(value)?;
    Ok(format!(
        "{}{}{}",
        storage_units(&payload),
        LENGTH_DELIMITER,
        payload
    ))
}

/// Encodes `value` as plain JSON, without the length prefix.
pub fn encode_plain<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

// == Deserialize ==
/// Decodes a raw record.
///
/// Plain JSON that is not a string passes through unchanged. Length-prefixed
/// records are checked and parsed; a mismatch or an unparseable payload
/// yields `None`. Any other text comes back as a JSON string.
pub fn deserialize(raw: &str) -> Option<Value> {
    let text = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => inner,
        Ok(other) => return Some(other),
        Err(_) => raw.to_string(),
    };

    match split_length_prefix(&text) {
        Some((declared, payload)) => {
            if declared != storage_units(payload) {
                tracing::debug!(declared, "Length prefix mismatch, record treated as corrupted");
                return None;
            }
            serde_json::from_str(payload).ok()
        }
        None => Some(Value::String(text)),
    }
}

/// Splits `"<digits>|rest"` into the declared length and the rest.
fn split_length_prefix(text: &str) -> Option<(usize, &str)> {
    let (digits, payload) = text.split_once(LENGTH_DELIMITER)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // An absurdly long prefix cannot describe any payload we hold
    let declared = digits.parse().unwrap_or(usize::MAX);
    Some((declared, payload))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_prefixes_length() {
        assert_eq!(serialize(&json!({"a": 1})).unwrap(), "7|{\"a\":1}");
        assert_eq!(serialize("hi").unwrap(), "4|\"hi\"");
    }

    #[test]
    fn test_round_trip() {
        let value = json!({"value": [1, "two", null, true], "expire": -1});
        let wire = serialize(&value).unwrap();
        assert_eq!(deserialize(&wire), Some(value));
    }

    #[test]
    fn test_round_trip_non_ascii() {
        let value = json!({"text": "héllo 世界 😀"});
        let wire = serialize(&value).unwrap();
        assert_eq!(deserialize(&wire), Some(value));
    }

    #[test]
    fn test_length_counts_utf16_units() {
        // "😀" is two UTF-16 units, quoted gives 4
        assert_eq!(serialize("😀").unwrap(), "4|\"😀\"");
    }

    #[test]
    fn test_altered_length_is_corrupted() {
        let wire = serialize(&json!({"a": 1})).unwrap().replacen('7', "8", 1);
        assert_eq!(deserialize(&wire), None);
    }

    #[test]
    fn test_truncated_payload_is_corrupted() {
        let wire = serialize(&json!({"a": "long value"})).unwrap();
        let truncated = &wire[..wire.len() - 3];
        assert_eq!(deserialize(truncated), None);
    }

    #[test]
    fn test_unparseable_payload_is_corrupted() {
        // Right length, broken JSON
        assert_eq!(deserialize("5|{a:1}"), None);
    }

    #[test]
    fn test_plain_json_passes_through() {
        assert_eq!(deserialize("{\"legacy\":true}"), Some(json!({"legacy": true})));
        assert_eq!(deserialize("42"), Some(json!(42)));
    }

    #[test]
    fn test_bare_text_comes_back_as_string() {
        assert_eq!(deserialize("plain text"), Some(json!("plain text")));
        assert_eq!(deserialize("a|b"), Some(json!("a|b")));
    }

    #[test]
    fn test_json_quoted_wire_form_is_unwrapped() {
        let wire = serialize(&json!([1, 2])).unwrap();
        let quoted = serde_json::to_string(&wire).unwrap();
        assert_eq!(deserialize(&quoted), Some(json!([1, 2])));
    }

    #[test]
    fn test_encode_plain_has_no_prefix() {
        assert_eq!(encode_plain(&json!({"a": 1})).unwrap(), "{\"a\":1}");
    }
}
