//! Base64 transforms for the Gmail boundary: the URL-safe `raw` payload and
//! the attachment and body data the API returns

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

/// Encode bytes as padded URL-safe base64 (the Gmail `raw` format)
pub fn encode_url_safe(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Decode base64 leniently.
///
/// Accepts both the URL-safe and the standard alphabet, with or without
/// padding, and ignores embedded whitespace (folded MIME bodies).
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let cleaned: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(cleaned.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_safe_roundtrip_binary() {
        let data: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_url_safe(&data);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_decode_tolerates_missing_padding_and_alphabet() {
        // Gmail body data arrives without padding
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        // 0xfb 0xff encodes to "+/8=" in the standard alphabet
        assert_eq!(decode_base64("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_base64("-_8").unwrap(), vec![0xfb, 0xff]);
    }
}
