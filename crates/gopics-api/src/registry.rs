use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;
use thiserror::Error;
use tracing::info;

use gopics_crypto::password::{self, PasswordError};
use gopics_db::{Database, DbError};
use gopics_types::models::User;

/// Substrings a name may not contain; they collide with routes.
pub const RESERVED_NAMES: [&str; 8] = [
    "index",
    "register",
    "login",
    "logout",
    "registration",
    "post",
    "media",
    "static",
];

pub const MIN_PASSWORD_LEN: usize = 8;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\pL\pN !?'.-]+$").expect("valid name pattern"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9+&*-]+(?:\.[a-zA-Z0-9_+&*-]+)*@(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,7}$")
        .expect("valid email pattern")
});

/// A rejected sign-up. The message is shown to the user as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Your username is invalid!")]
    InvalidName,
    #[error("You cannot choose that name!")]
    ReservedName,
    #[error("A user with the same name already exist!")]
    NameTaken,
    #[error("Your email is invalid!")]
    InvalidEmail,
    #[error("Your password is too short!")]
    PasswordTooShort,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Check a candidate against the sign-up rules; the first failing rule wins.
pub async fn validate(db: &Database, candidate: &Candidate) -> Result<(), RegistryError> {
    check_name(&candidate.name)?;
    if db.get_user(&candidate.name).await?.is_some() {
        return Err(ValidationError::NameTaken.into());
    }
    check_credentials(&candidate.email, &candidate.password)?;
    Ok(())
}

/// Hash the password and store the user.
///
/// The write is conditional, so a name registered since `validate` ran is
/// reported as taken instead of being overwritten.
pub async fn create(db: &Database, candidate: Candidate) -> Result<User, RegistryError> {
    let Candidate {
        name,
        email,
        password,
    } = candidate;

    let hash = tokio::task::spawn_blocking(move || password::hash_password(password.as_bytes()))
        .await??;

    let user = User {
        pic_url: avatar_url(&email),
        name,
        email,
        password: hash.into_bytes(),
    };

    match db.create_user(user.clone()).await {
        Ok(()) => {}
        Err(DbError::NameTaken(_)) => return Err(ValidationError::NameTaken.into()),
        Err(e) => return Err(e.into()),
    }

    info!("Registered user {}", user.name);
    Ok(user)
}

/// Gravatar address for `email`.
pub fn avatar_url(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{}", hex::encode(digest))
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidName);
    }
    if RESERVED_NAMES.iter().any(|reserved| name.contains(reserved)) {
        return Err(ValidationError::ReservedName);
    }
    Ok(())
}

fn check_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}
