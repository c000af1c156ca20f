use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::Duration;

use gopics_crypto::cookie::DEFAULT_MAX_AGE;
use gopics_crypto::{CookieError, Keyring};

pub const AUTH_COOKIE: &str = "AUTH";

/// Name of the logged-in user.
///
/// `Ok(None)` when no session cookie was sent; an error when one was sent
/// but failed verification.
pub fn current_user(jar: &CookieJar, keyring: &Keyring) -> Result<Option<String>, CookieError> {
    match jar.get(AUTH_COOKIE) {
        None => Ok(None),
        Some(cookie) => keyring.decode(AUTH_COOKIE, cookie.value()).map(Some),
    }
}

pub fn start_session(jar: CookieJar, keyring: &Keyring, name: &str) -> Result<CookieJar, CookieError> {
    let value = keyring.encode(AUTH_COOKIE, name)?;
    Ok(jar.add(auth_cookie(value, Duration::seconds(DEFAULT_MAX_AGE))))
}

pub fn end_session(jar: CookieJar) -> CookieJar {
    jar.add(auth_cookie(String::new(), Duration::seconds(-1)))
}

fn auth_cookie(value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .max_age(max_age)
        .build()
}
