//! Base64 token codec.
//!
//! [`PlaintextCrypto`] treats the session token as the base64 encoding of
//! the claims document. It offers no confidentiality and exists for local
//! environments and tests, where a real key service is not reachable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::traits::{CryptoService, DecryptionError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCrypto;

impl PlaintextCrypto {
    /// Produces a token that [`CryptoService::decrypt`] opens back into `plaintext`.
    #[must_use]
    pub fn seal(plaintext: &str) -> String {
        STANDARD.encode(plaintext)
    }
}

impl CryptoService for PlaintextCrypto {
    fn decrypt(&self, token: &str) -> Result<String, DecryptionError> {
        let bytes = STANDARD
            .decode(token.trim())
            .map_err(|e| DecryptionError::new(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| DecryptionError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_token_opens() {
        let token = PlaintextCrypto::seal(r#"{"Environment":"LOCAL"}"#);
        assert_eq!(
            PlaintextCrypto.decrypt(&token).unwrap(),
            r#"{"Environment":"LOCAL"}"#
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(PlaintextCrypto.decrypt("not/base64!!").is_err());
    }

    #[test]
    fn non_utf8_plaintext_is_rejected() {
        let token = STANDARD.encode([0xff, 0xfe, 0x00]);
        assert!(PlaintextCrypto.decrypt(&token).is_err());
    }
}
