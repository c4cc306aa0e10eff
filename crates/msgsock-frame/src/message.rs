use std::sync::Arc;

use serde_json::Value;

use crate::error::{FrameError, Result};

/// Pluggable message serialization.
///
/// `encode` turns an application value into delimiter-free text; `decode`
/// is its inverse. An encode failure aborts only the write that triggered
/// it; a decode failure is reported per frame.
pub trait MessageCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String>;
    fn decode(&self, text: &str) -> Result<Value>;
}

/// Default JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|err| FrameError::Encode(err.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|err| FrameError::Decode(err.to_string()))
    }
}

/// Text transform applied to an encoded message before framing. Filters run
/// in the order supplied with the write.
pub type WriteFilter = Arc<dyn Fn(String) -> String + Send + Sync>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_roundtrip() {
        let codec = JsonCodec;
        let value = json!({"kind": "ping", "seq": 7});

        let text = codec.encode(&value).unwrap();
        let decoded = codec.decode(&text).unwrap();

        assert_eq!(decoded, value);
    }

    #[test]
    fn json_decode_failure() {
        let codec = JsonCodec;
        let err = codec.decode("{not json").unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn scalar_values_supported() {
        let codec = JsonCodec;
        for value in [json!(null), json!(42), json!("text"), json!([1, 2, 3])] {
            let text = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&text).unwrap(), value);
        }
    }
}
