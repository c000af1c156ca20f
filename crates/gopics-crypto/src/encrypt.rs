use aes_gcm::{
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
    aead::{Aead, KeyInit, OsRng, consts::U12, rand_core::RngCore},
    aes::Aes192,
};

use crate::keys::KeyError;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;

/// AES-GCM with a key size picked from the block key length.
pub enum BlockCipher {
    Aes128(Box<Aes128Gcm>),
    Aes192(Box<Aes192Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl BlockCipher {
    pub fn new(key: &[u8]) -> Result<Self, KeyError> {
        let invalid = |_| KeyError::BlockKeyLength(key.len());
        match key.len() {
            16 => Ok(Self::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(invalid)?,
            ))),
            24 => Ok(Self::Aes192(Box::new(
                Aes192Gcm::new_from_slice(key).map_err(invalid)?,
            ))),
            32 => Ok(Self::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(invalid)?,
            ))),
            n => Err(KeyError::BlockKeyLength(n)),
        }
    }

    /// Seal `plaintext` under a fresh random nonce.
    /// Returns `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext)?,
            Self::Aes192(c) => c.encrypt(nonce, plaintext)?,
            Self::Aes256(c) => c.encrypt(nonce, plaintext)?,
        };

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a value produced by [`BlockCipher::encrypt`].
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
        if sealed.len() < NONCE_LEN {
            return Err(aes_gcm::Error);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        match self {
            Self::Aes128(c) => c.decrypt(nonce, ciphertext),
            Self::Aes192(c) => c.decrypt(nonce, ciphertext),
            Self::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
    }
}
