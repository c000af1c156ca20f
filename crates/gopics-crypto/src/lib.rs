//! GoPics crypto library.
//!
//! Stateless sessions: a cookie value is authenticated with HMAC-SHA256 and,
//! when a block key is configured, sealed with AES-GCM. There is no server
//! side session table; the cookie is the session.

pub mod cookie;
pub mod encrypt;
pub mod keys;
pub mod password;

pub use cookie::{CookieError, Keyring};
pub use keys::KeyError;
