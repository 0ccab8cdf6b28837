//! Encode/decode capability and query flattening.
//!
//! The codec is injected through `Configuration`. `JsonCodec` is the default.
//! Query flattening always goes through `serde_json::Value` regardless of the
//! configured codec: only top-level string, bool and integer fields survive,
//! everything else is dropped without an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{DecodeError, EncodeError};

/// Turns values into request bodies and response bodies into values.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Flatten a serializable object into `(key, value)` pairs.
///
/// Returns `None` when `value` does not serialize to a JSON object.
pub fn query_pairs<T: Serialize + ?Sized>(value: &T) -> Option<Vec<(String, String)>> {
    let Value::Object(fields) = serde_json::to_value(value).ok()? else {
        return None;
    };

    let pairs = fields
        .into_iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
                _ => return None,
            };
            Some((key, rendered))
        })
        .collect();
    Some(pairs)
}

/// Render flattened pairs as an `application/x-www-form-urlencoded` string.
pub fn form_encode<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    let pairs = query_pairs(value)?;
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish(),
    )
}
