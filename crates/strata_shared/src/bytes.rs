//! Base64 helpers for byte arrays embedded in JSON payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encodes raw bytes as standard base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes a standard base64 string.
///
/// # Errors
///
/// Returns the decoder error for invalid characters or padding.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text.as_bytes())
}

/// `#[serde(with = "...")]` adapter storing `Vec<u8>` as a base64 string.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes bytes as a base64 string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    /// Deserializes bytes from a base64 string.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a string or not valid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_base64(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip_edge_bytes() {
        let bytes = vec![0u8, 1, 127, 128, 254, 255];
        let text = encode_base64(&bytes);
        assert_eq!(decode_base64(&text).unwrap(), bytes);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(decode_base64("not base64!!").is_err());
    }
}
