use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

impl From<password_hash::Error> for PasswordError {
    fn from(e: password_hash::Error) -> Self {
        Self(e.to_string())
    }
}

/// Hash a password with Argon2id. Returns the PHC string.
pub fn hash_password(password: &[u8]) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password, &salt)?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string.
/// A mismatch is `Ok(false)`; a malformed hash is an error.
pub fn verify_password(hash: &str, password: &[u8]) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
