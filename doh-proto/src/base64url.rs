//! RFC 4648 §5 base64url, no padding. Used for the `dns=` query parameter of
//! DoH GET requests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

#[derive(Debug, PartialEq, Eq)]
pub struct DecodeError;

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid base64url input")
    }
}

impl std::error::Error for DecodeError {}

pub fn encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(input).map_err(|_| DecodeError)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};

    #[test]
    fn should_roundtrip_arbitrary_bytes() {
        let original = b"\x00\x01\x02hello doh world\xff\xfe";
        let encoded = encode(original);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn should_encode_without_padding() {
        assert_eq!(encode(b"f"), "Zg");
        assert_eq!(encode(b"fo"), "Zm8");
        assert_eq!(encode(b"foo"), "Zm9v");
    }

    #[test]
    fn should_reject_invalid_characters() {
        assert!(decode("not valid!!").is_err());
    }
}
