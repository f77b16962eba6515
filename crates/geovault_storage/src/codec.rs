//! Payload encoding.
//!
//! Stored payloads are CBOR. Values are decoded on every read, so a caller
//! never shares memory with the store.

use crate::error::{StorageError, StorageResult};
use serde_json::Value;

/// Encodes a JSON value as CBOR bytes.
pub(crate) fn encode(value: &Value) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StorageError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes CBOR bytes back into a JSON value.
pub(crate) fn decode(bytes: &[u8]) -> StorageResult<Value> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Codec(e.to_string()))
}

/// Writes `new` at a JSON pointer, creating intermediate objects.
///
/// Returns false if a non-object value is in the way.
pub(crate) fn set_pointer(target: &mut Value, pointer: &str, new: Value) -> bool {
    let mut tokens = pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .peekable();

    let mut current = target;
    while let Some(token) = tokens.next() {
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            return false;
        };
        if tokens.peek().is_none() {
            map.insert(token, new);
            return true;
        }
        current = map.entry(token).or_insert(Value::Null);
    }
    false
}
