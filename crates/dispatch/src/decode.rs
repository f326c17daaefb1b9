//! Raw payload wrapper and generic JSON decoding.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::DecodeError;

/// An invocation payload as received from the host: bytes that are expected
/// to hold JSON, with no shape assumed until classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload(Vec<u8>);

impl RawPayload {
    /// Wraps raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Re-encodes an already-parsed JSON value (as handed over by the host
    /// runtime) into a raw payload.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| DecodeError::json("host payload", e))
    }

    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parses the payload as an untyped JSON value. Returns `None` if it is
    /// not valid JSON.
    pub fn parse(&self) -> Option<Value> {
        serde_json::from_slice(&self.0).ok()
    }
}

impl From<&str> for RawPayload {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for RawPayload {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Decodes JSON bytes into `T`.
pub fn decode_slice<T: DeserializeOwned>(
    bytes: &[u8],
    target: &'static str,
) -> Result<T, DecodeError> {
    serde_json::from_slice(bytes).map_err(|e| DecodeError::json(target, e))
}

/// Decodes a JSON document carried as a string (queue bodies, topic messages).
pub fn decode_str<T: DeserializeOwned>(text: &str, target: &'static str) -> Result<T, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError::json(target, e))
}

/// Decodes an embedded JSON value (scheduled-event detail) without cloning it.
pub fn decode_value<T: DeserializeOwned>(
    value: &Value,
    target: &'static str,
) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|e| DecodeError::json(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Request {
        user_uuid: String,
    }

    #[test]
    fn test_decode_str_reports_target_on_failure() {
        let err = decode_str::<Request>("{\"user_uuid\":", "queue message body").unwrap_err();
        assert!(err.to_string().contains("queue message body"));
    }

    #[test]
    fn test_decode_value_borrows_embedded_detail() {
        let detail = serde_json::json!({ "user_uuid": "iao" });
        let request: Request = decode_value(&detail, "scheduled event detail").unwrap();
        assert_eq!(request.user_uuid, "iao");
    }

    #[test]
    fn test_invalid_json_does_not_parse() {
        assert!(RawPayload::from("not json").parse().is_none());
        assert!(RawPayload::from("{}").parse().is_some());
    }
}
