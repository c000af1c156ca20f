//! One-shot messages carried to the next page in the `FLASH` cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use time::Duration;

pub const FLASH_COOKIE: &str = "FLASH";

pub fn set_flash(jar: CookieJar, message: &str) -> CookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(message)))
        .path("/")
        .http_only(true)
        .build();
    jar.add(cookie)
}

/// Read the pending message, if any, and expire the cookie so it shows once.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(value) = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) else {
        return (jar, None);
    };

    let expired = Cookie::build((FLASH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::seconds(-1))
        .build();
    let jar = jar.add(expired);

    let message = URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|m| !m.is_empty());
    (jar, message)
}
