//! Payload decoding for node data.


use serde_json::Map;
use serde_json::Value;

use crate::constants::STRING_VALUE_KEY;

/// Turns a raw node payload into the value stored in a [`Snapshot`](crate::Snapshot).
///
/// Decoding never fails: whatever bytes the namespace holds, the watcher has
/// to cache something for them.
pub trait PayloadDecoder: Send + Sync + 'static {
    fn decode(
        &self,
        raw: &[u8],
    ) -> Value;
}

/// Default decoder used by service registries that publish JSON objects.
///
/// - empty payload → `{}`
/// - valid JSON → the parsed value
/// - anything else → `{"string_value": "<payload as text>"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadDecoder;

impl PayloadDecoder for JsonPayloadDecoder {
    fn decode(
        &self,
        raw: &[u8],
    ) -> Value {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Value::Object(Map::new());
        }

        match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(_) => {
                let mut map = Map::new();
                map.insert(
                    STRING_VALUE_KEY.to_string(),
                    Value::String(String::from_utf8_lossy(raw).into_owned()),
                );
                Value::Object(map)
            }
        }
    }
}
