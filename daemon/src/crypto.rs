//! Authenticated encryption for credentials at rest.
//!
//! AES-256-GCM with a random 96-bit nonce per message. The ciphertext is
//! stored as base64(nonce || ciphertext). The 256-bit key lives base64-encoded
//! in the config store (`security.encryption_key`) and is generated on first
//! use.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug)]
pub enum CryptoError {
    /// Key material is not valid base64 or has the wrong length.
    InvalidKey(String),

    /// Ciphertext is malformed or fails authentication.
    DecryptFailed,

    /// Encryption itself failed.
    EncryptFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey(reason) => write!(f, "Invalid encryption key: {}", reason),
            CryptoError::DecryptFailed => {
                write!(f, "Decryption failed: ciphertext corrupt or wrong key")
            }
            CryptoError::EncryptFailed => write!(f, "Encryption failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

pub struct CryptoBox {
    cipher: Aes256Gcm,
}

impl CryptoBox {
    /// Build a box from a base64-encoded 256-bit key.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, CryptoError> {
        let key_bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if key_bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generate a fresh random key, base64-encoded for the config store.
    pub fn generate_key_b64() -> String {
        let key = Aes256Gcm::generate_key(OsRng);
        BASE64.encode(key)
    }

    /// Encrypt a secret. Empty input stays empty so absent credentials never
    /// produce ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let nonce = Aes256Gcm::generate_nonce(OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Decrypt a secret produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, CryptoError> {
        if ciphertext_b64.is_empty() {
            return Ok(String::new());
        }

        let payload = BASE64
            .decode(ciphertext_b64.trim())
            .map_err(|_| CryptoError::DecryptFailed)?;
        if payload.len() <= NONCE_LEN {
            return Err(CryptoError::DecryptFailed);
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box() -> CryptoBox {
        CryptoBox::from_base64_key(&CryptoBox::generate_key_b64()).unwrap()
    }

    #[test]
    fn round_trip() {
        let crypto = test_box();
        for secret in ["p4ssw0rd", "with spaces and @:/%", "ü🔑"] {
            let ciphertext = crypto.encrypt(secret).unwrap();
            assert_ne!(ciphertext, secret);
            assert_eq!(crypto.decrypt(&ciphertext).unwrap(), secret);
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        let crypto = test_box();
        assert_eq!(crypto.encrypt("").unwrap(), "");
        assert_eq!(crypto.decrypt("").unwrap(), "");
    }

    #[test]
    fn nonce_makes_ciphertexts_differ() {
        let crypto = test_box();
        let a = crypto.encrypt("secret").unwrap();
        let b = crypto.encrypt("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let crypto = test_box();
        let ciphertext = crypto.encrypt("secret").unwrap();
        let mut bytes = BASE64.decode(&ciphertext).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);
        assert!(crypto.decrypt(&tampered).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let a = test_box();
        let b = test_box();
        let ciphertext = a.encrypt("secret").unwrap();
        assert!(b.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(CryptoBox::from_base64_key("not base64 !!!").is_err());
        assert!(CryptoBox::from_base64_key(&BASE64.encode([0u8; 16])).is_err());
    }
}
