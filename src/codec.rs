//! The encode/decode collaborator: turns a `(K, V)` pair into the payload
//! bytes a framed record carries, and back.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::MrError;

/// Encodes a `(K, V)` pair to bytes and decodes bytes back to `(K, V)`.
///
/// The core is agnostic to wire format: any implementation that round-trips
/// bytes back to the original pair works. This crate ships [`SerdeJsonCodec`] as a
/// ready-to-use default.
pub trait Codec<K, V>: Send + Sync {
    fn encode(&self, key: &K, value: &V) -> Vec<u8>;
    fn decode(&self, bytes: &[u8]) -> Result<(K, V), MrError>;
}

/// A `Codec` built on `serde_json`. Works for any `K`/`V` that are
/// `Serialize + DeserializeOwned`; not the most compact wire format, but
/// legible in a hexdump and zero-ceremony for callers who already have
/// `serde` derives on their types.
pub struct SerdeJsonCodec;

impl<K, V> Codec<K, V> for SerdeJsonCodec
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, key: &K, value: &V) -> Vec<u8> {
        serde_json::to_vec(&(key, value)).expect("K/V must serialize to JSON")
    }

    fn decode(&self, bytes: &[u8]) -> Result<(K, V), MrError> {
        serde_json::from_slice::<(K, V)>(bytes)
            .map_err(|e| MrError::invariant(format!("malformed shuffle record: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_round_trips() {
        let codec = SerdeJsonCodec;
        let bytes = Codec::<String, i64>::encode(&codec, &"a".to_string(), &42);
        let (k, v) = Codec::<String, i64>::decode(&codec, &bytes).unwrap();
        assert_eq!(k, "a");
        assert_eq!(v, 42);
    }

    #[test]
    fn json_codec_rejects_malformed_bytes() {
        let codec = SerdeJsonCodec;
        let err = Codec::<String, i64>::decode(&codec, b"not json").unwrap_err();
        assert_eq!(err.kind(), "invariant-violation");
    }
}
