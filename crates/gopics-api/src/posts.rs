use axum::{
    extract::{State, multipart::{Multipart, MultipartRejection}},
    http::{HeaderMap, header::CONTENT_LENGTH},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ingest, timeline_path};

/// POST /post: multipart form with a `picture` file and a `text` caption.
pub async fn create_post(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Redirect, ApiError> {
    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let committed = ingest::begin(&state)
        .authenticate(&jar)?
        .validate(content_length, form)
        .await?
        .normalize()
        .await?
        .commit()
        .await?;

    Ok(Redirect::to(&timeline_path(&committed.owner)))
}
