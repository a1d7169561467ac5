//! AES-256-GCM encryption for PHI payloads that must be individually
//! reversible (unlike the one-way anonymous-ID mapping in [`super`]).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

pub const IV_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const KEY_ENV_VAR: &str = "VCF_PG_LOADER_PHI_KEY";

/// Encrypts and decrypts PHI payloads with a single symmetric key, loaded
/// once at startup (never persisted in plaintext on disk).
pub struct PhiEncryptor {
    cipher: Aes256Gcm,
}

impl PhiEncryptor {
    /// Build an encryptor from a raw 32-byte key.
    pub fn new(key_bytes: &[u8]) -> Result<PhiEncryptor, crate::err::LoaderError> {
        if key_bytes.len() != 32 {
            return Err(crate::err::LoaderError::PhiEncryption(format!(
                "PHI key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(PhiEncryptor {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Load the key from the `VCF_PG_LOADER_PHI_KEY` environment variable,
    /// base64-decoding it.
    pub fn from_env() -> Result<PhiEncryptor, crate::err::LoaderError> {
        let raw = std::env::var(KEY_ENV_VAR).map_err(|_| {
            crate::err::LoaderError::PhiEncryption(format!("{KEY_ENV_VAR} is not set"))
        })?;
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, raw.trim())
            .map_err(|e| crate::err::LoaderError::PhiEncryption(format!("invalid base64 PHI key: {e}")))?;
        Self::new(&bytes)
    }

    /// Encrypt `plaintext`, returning `iv || ciphertext_with_tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, crate::err::LoaderError> {
        let mut iv_bytes = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv_bytes);
        let nonce = Nonce::from_slice(&iv_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| crate::err::LoaderError::PhiEncryption(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
        out.extend_from_slice(&iv_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a payload produced by [`Self::encrypt`].
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, crate::err::LoaderError> {
        if payload.len() < IV_SIZE + TAG_SIZE {
            return Err(crate::err::LoaderError::PhiEncryption(
                "payload too short to contain IV and tag".to_string(),
            ));
        }
        let (iv_bytes, ciphertext) = payload.split_at(IV_SIZE);
        let nonce = Nonce::from_slice(iv_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| crate::err::LoaderError::PhiEncryption(format!("decryption failed: {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn round_trip_encrypt_decrypt() {
        let enc = PhiEncryptor::new(&test_key()).unwrap();
        let payload = enc.encrypt(b"patient-mrn-00123").unwrap();
        assert_eq!(&payload[..IV_SIZE].len(), &IV_SIZE);
        let decrypted = enc.decrypt(&payload).unwrap();
        assert_eq!(decrypted, b"patient-mrn-00123");
    }

    #[test]
    fn distinct_ivs_for_repeated_encryptions() {
        let enc = PhiEncryptor::new(&test_key()).unwrap();
        let a = enc.encrypt(b"same-plaintext").unwrap();
        let b = enc.encrypt(b"same-plaintext").unwrap();
        assert_ne!(a[..IV_SIZE], b[..IV_SIZE]);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(PhiEncryptor::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let enc = PhiEncryptor::new(&test_key()).unwrap();
        let mut payload = enc.encrypt(b"patient-mrn-00123").unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;
        assert!(enc.decrypt(&payload).is_err());
    }
}
