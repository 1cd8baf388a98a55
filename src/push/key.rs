//! Relay public key decoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{NotifyError, NotifyResult};

/// Decode a relay (application server) public key from its URL-safe base64
/// transport form into raw bytes.
///
/// Missing padding is restored and the URL-safe alphabet is mapped back to the
/// standard one before decoding.
pub fn decode_relay_key(key: &str) -> NotifyResult<Vec<u8>> {
    let key = key.trim();
    if key.is_empty() {
        return Err(NotifyError::InvalidKey("key is empty".to_string()));
    }

    let padding = (4 - key.len() % 4) % 4;
    let standard: String = key
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .chain(std::iter::repeat('=').take(padding))
        .collect();

    STANDARD
        .decode(standard.as_bytes())
        .map_err(|e| NotifyError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn test_missing_padding_is_restored() {
        let decoded = decode_relay_key("abc").unwrap();
        let direct = STANDARD.decode("abc=").unwrap();
        assert_eq!(decoded.len(), direct.len());
        assert_eq!(decoded, direct);
    }

    #[test]
    fn test_url_safe_alphabet_is_accepted() {
        let decoded = decode_relay_key("ab-_").unwrap();
        assert_eq!(decoded, STANDARD.decode("ab+/").unwrap());

        assert!(decode_relay_key("-_-_").is_ok());
    }

    #[test]
    fn test_already_padded_key() {
        assert_eq!(decode_relay_key("abc=").unwrap().len(), 2);
    }

    #[test]
    fn test_uncompressed_p256_key() {
        let mut raw = vec![0x04u8];
        raw.extend((0..64u8).map(|b| b.wrapping_mul(37)));
        let transport = URL_SAFE_NO_PAD.encode(&raw);
        assert_eq!(transport.len(), 87);

        assert_eq!(decode_relay_key(&transport).unwrap(), raw);
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        for key in ["", "   ", "ab$d", "abcde", "a=bc"] {
            assert!(
                matches!(decode_relay_key(key), Err(NotifyError::InvalidKey(_))),
                "expected {:?} to be rejected",
                key
            );
        }
    }
}
