//! Versioned binary encoding for configs, keys, and round messages
//!
//! Every persisted or transmitted artifact is a single format-version byte
//! followed by a bincode body. Encoding is deterministic: participants that
//! independently decode the same bytes converge on bit-identical state, and
//! re-encoding produces the same bytes. A message from a future format
//! version fails to decode instead of being misparsed.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

/// Current wire format version. Bump on any layout change.
pub const FORMAT_VERSION: u8 = 1;

// DefaultOptions rather than the legacy free functions: those allow
// trailing bytes
fn options() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Encode a value as version byte + bincode
pub(crate) fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    let mut bytes = vec![FORMAT_VERSION];
    bytes.extend(
        options()
            .serialize(value)
            .expect("bincode serialization is infallible for in-memory values"),
    );
    bytes
}

/// Decode a version byte + bincode buffer. `None` on version mismatch,
/// malformed body, or trailing bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    let (&version, body) = bytes.split_first()?;
    if version != FORMAT_VERSION {
        return None;
    }
    options().deserialize(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let value = (7u16, "hello".to_string(), vec![1u8, 2, 3]);
        let bytes = encode(&value);
        assert_eq!(bytes[0], FORMAT_VERSION);
        let decoded: (u16, String, Vec<u8>) = decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = vec!["a".to_string(), "b".to_string()];
        assert_eq!(encode(&value), encode(&value));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = encode(&42u64);
        bytes[0] = FORMAT_VERSION + 1;
        assert!(decode::<u64>(&bytes).is_none());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode(&42u64);
        bytes.push(0);
        assert!(decode::<u64>(&bytes).is_none());
    }
}
