use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use gopics_crypto::Keyring;
use gopics_db::timeline::DEFAULT_LIMIT;
use gopics_types::api::Page;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{flash, session, timeline_path};

/// GET /
pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Result<Response, ApiError> {
    if let Some(name) = logged_user(&jar, &state.keyring)? {
        return Ok(Redirect::to(&timeline_path(&name)).into_response());
    }

    let (jar, val_error) = flash::take_flash(jar);
    let page = Page {
        val_error,
        ..Page::titled("Welcome!")
    };
    Ok((jar, Json(page)).into_response())
}

/// GET /register
pub async fn register(jar: CookieJar) -> impl IntoResponse {
    let (jar, val_error) = flash::take_flash(jar);
    let page = Page {
        val_error,
        ..Page::titled("Sign Up")
    };
    (jar, Json(page))
}

/// GET /{username}
pub async fn timeline(
    State(state): State<AppState>,
    Path(username): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    // Anything naming the index is the index.
    if username.contains("index") {
        return index(State(state), jar).await;
    }

    let logged_user = logged_user(&jar, &state.keyring)?;
    let user = state.db.get_user(&username).await?.ok_or(ApiError::NotFound)?;
    let posts = state.db.recent_posts(&user.name, DEFAULT_LIMIT).await?;

    let (jar, val_error) = flash::take_flash(jar);
    let page = Page {
        user: Some(user),
        posts,
        logged_user,
        val_error,
        ..Page::titled(&username)
    };
    Ok((jar, Json(page)).into_response())
}

/// A cookie that was sent but fails verification is a bad request here, not
/// an anonymous visit.
fn logged_user(jar: &CookieJar, keyring: &Keyring) -> Result<Option<String>, ApiError> {
    session::current_user(jar, keyring).map_err(|e| {
        debug!("Rejecting page request: {}", e);
        ApiError::BadRequest("invalid session cookie".into())
    })
}
