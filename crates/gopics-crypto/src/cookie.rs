use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::encrypt::BlockCipher;
use crate::keys::{KeyError, check_hash_key};

type HmacSha256 = Hmac<Sha256>;

/// Longest encoded value a browser is expected to keep.
pub const MAX_ENCODED_LEN: usize = 4096;

/// One week, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 60 * 60 * 24 * 7;

/// Tolerated clock drift for timestamps from the future.
const CLOCK_SKEW: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    /// Bad tag, malformed payload, stale value or failed decryption.
    /// Deliberately carries no detail.
    #[error("cookie value failed integrity check")]
    Integrity,
    #[error("encoded cookie value exceeds {MAX_ENCODED_LEN} bytes")]
    TooLong,
    #[error("cookie value could not be sealed")]
    Seal,
}

/// Keys for signing (and optionally encrypting) cookie values.
///
/// Built once at startup and shared read-only.
pub struct Keyring {
    hash_key: Vec<u8>,
    block: Option<BlockCipher>,
    max_age: i64,
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("encrypted", &self.block.is_some())
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl Keyring {
    /// `hash_key` must be 32 or 64 bytes. `block_key`, when present, must be
    /// 16, 24 or 32 bytes; without it values are authenticated but legible.
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> Result<Self, KeyError> {
        check_hash_key(hash_key)?;
        let block = block_key.map(BlockCipher::new).transpose()?;

        Ok(Self {
            hash_key: hash_key.to_vec(),
            block,
            max_age: DEFAULT_MAX_AGE,
        })
    }

    /// Reject values older than `secs`. Zero disables the check.
    pub fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age = secs;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.block.is_some()
    }

    /// Encode `value` for the cookie called `name`.
    pub fn encode(&self, name: &str, value: &str) -> Result<String, CookieError> {
        self.encode_at(name, value, unix_now())
    }

    /// Verify and open a value produced by [`Keyring::encode`].
    pub fn decode(&self, name: &str, cookie: &str) -> Result<String, CookieError> {
        self.decode_at(name, cookie, unix_now())
    }

    fn encode_at(&self, name: &str, value: &str, now: i64) -> Result<String, CookieError> {
        let body = match &self.block {
            Some(cipher) => cipher
                .encrypt(value.as_bytes())
                .map_err(|_| CookieError::Seal)?,
            None => value.as_bytes().to_vec(),
        };
        let body = B64.encode(body);
        let timestamp = now.to_string();

        let tag = self
            .mac(name, timestamp.as_bytes(), body.as_bytes())?
            .finalize()
            .into_bytes();

        let mut raw = format!("{timestamp}|{body}|").into_bytes();
        raw.extend_from_slice(&tag);

        let encoded = B64.encode(raw);
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(CookieError::TooLong);
        }
        Ok(encoded)
    }

    fn decode_at(&self, name: &str, cookie: &str, now: i64) -> Result<String, CookieError> {
        if cookie.len() > MAX_ENCODED_LEN {
            return Err(CookieError::Integrity);
        }
        let raw = B64.decode(cookie).map_err(|_| CookieError::Integrity)?;

        // The tag is raw bytes and may contain '|', so split at most twice.
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(body), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CookieError::Integrity);
        };

        self.mac(name, timestamp, body)?
            .verify_slice(tag)
            .map_err(|_| CookieError::Integrity)?;

        let issued: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or(CookieError::Integrity)?;
        if issued > now + CLOCK_SKEW {
            return Err(CookieError::Integrity);
        }
        if self.max_age > 0 && now - issued > self.max_age {
            return Err(CookieError::Integrity);
        }

        let body = B64.decode(body).map_err(|_| CookieError::Integrity)?;
        let plain = match &self.block {
            Some(cipher) => cipher.decrypt(&body).map_err(|_| CookieError::Integrity)?,
            None => body,
        };

        String::from_utf8(plain).map_err(|_| CookieError::Integrity)
    }

    fn mac(&self, name: &str, timestamp: &[u8], body: &[u8]) -> Result<HmacSha256, CookieError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.hash_key).map_err(|_| CookieError::Integrity)?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(body);
        Ok(mac)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
