//! Value codec for cached payloads.
//!
//! Strings are stored verbatim; everything else is stored as JSON text.
//! Reads are tolerant: a payload that is not JSON comes back as a string.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cached value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a value for storage.
pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<String, CodecError> {
    match serde_json::to_value(value).map_err(CodecError::Encode)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Decode a stored payload, falling back to the raw string.
pub fn decode(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

/// Decode a stored payload into `T`.
///
/// Raw (non-JSON) payloads are offered to `T` as a JSON string before failing.
pub fn decode_as<T: DeserializeOwned>(raw: String) -> Result<T, CodecError> {
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => serde_json::from_value(Value::String(raw)).map_err(|_| CodecError::Decode(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Weights {
        relevance: f64,
        popularity: f64,
    }

    #[test]
    fn test_strings_pass_through() {
        assert_eq!(encode("plain text").unwrap(), "plain text");
        assert_eq!(encode(&"quoted \"value\"".to_string()).unwrap(), "quoted \"value\"");
    }

    #[test]
    fn test_structured_values() {
        let encoded = encode(&json!({"ids": [1, 2, 3]})).unwrap();
        assert_eq!(encoded, r#"{"ids":[1,2,3]}"#);
        assert_eq!(decode(encoded), json!({"ids": [1, 2, 3]}));
    }

    #[test]
    fn test_tolerant_decode() {
        assert_eq!(decode("not json {".to_string()), json!("not json {"));
        assert_eq!(decode_as::<String>("raw".to_string()).unwrap(), "raw");
    }

    #[test]
    fn test_typed_decode() {
        let w = Weights { relevance: 0.7, popularity: 0.3 };
        let decoded: Weights = decode_as(encode(&w).unwrap()).unwrap();
        assert_eq!(decoded, w);

        let err = decode_as::<Weights>("garbage".to_string()).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
