use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

/// Accepted HMAC key sizes.
pub const HASH_KEY_LENGTHS: [usize; 2] = [32, 64];

/// Accepted AES key sizes (AES-128, AES-192, AES-256).
pub const BLOCK_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("hash key must be 32 or 64 bytes, got {0}")]
    HashKeyLength(usize),
    #[error("block key must be 16, 24 or 32 bytes, got {0}")]
    BlockKeyLength(usize),
    #[error("invalid base64 key: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Generate `len` random bytes of key material.
pub fn generate_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encode a key to base64 for configuration files.
pub fn key_to_base64(key: &[u8]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key. Length is checked by [`crate::Keyring::new`].
pub fn key_from_base64(encoded: &str) -> Result<Vec<u8>, KeyError> {
    Ok(BASE64.decode(encoded.trim())?)
}

pub(crate) fn check_hash_key(key: &[u8]) -> Result<(), KeyError> {
    if HASH_KEY_LENGTHS.contains(&key.len()) {
        Ok(())
    } else {
        Err(KeyError::HashKeyLength(key.len()))
    }
}
