//! The picture upload pipeline.
//!
//! Each stage is its own type and consumes the one before it, so a post can
//! only be committed after the uploader is authenticated, the form is read
//! and the picture is normalized. Any failure drops the request before the
//! next stage.

use axum::{
    body::Bytes,
    extract::multipart::{Multipart, MultipartError, MultipartRejection},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Local, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gopics_media::normalize::CANONICAL_EXTENSION;
use gopics_types::models::{Post, User};

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::session;

pub const PICTURE_FIELD: &str = "picture";
pub const TEXT_FIELD: &str = "text";

/// Layout of `Post::time`, e.g. `Mon 2 Jan 2006 15:04`.
pub const TIME_LAYOUT: &str = "%a %-d %b %Y %H:%M";

pub struct Unauthenticated<'a> {
    state: &'a AppStateInner,
}

pub struct Authenticated<'a> {
    state: &'a AppStateInner,
    uploader: String,
}

pub struct Validated<'a> {
    state: &'a AppStateInner,
    uploader: String,
    picture: Bytes,
    text: String,
}

pub struct Normalized<'a> {
    state: &'a AppStateInner,
    uploader: String,
    image: gopics_media::Normalized,
    text: String,
}

#[derive(Debug)]
pub struct Committed {
    pub owner: String,
    pub post: Post,
}

pub fn begin(state: &AppStateInner) -> Unauthenticated<'_> {
    Unauthenticated { state }
}

impl<'a> Unauthenticated<'a> {
    /// Only a verified session may upload. A missing and a forged cookie are
    /// treated alike.
    pub fn authenticate(self, jar: &CookieJar) -> Result<Authenticated<'a>, ApiError> {
        let uploader = match session::current_user(jar, &self.state.keyring) {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!("Upload rejected: no session");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => {
                debug!("Upload rejected: {}", e);
                return Err(ApiError::Unauthorized);
            }
        };

        debug!("Upload authenticated for {}", uploader);
        Ok(Authenticated {
            state: self.state,
            uploader,
        })
    }
}

impl<'a> Authenticated<'a> {
    /// Check the declared length, then read the `picture` and `text` fields.
    pub async fn validate(
        self,
        content_length: Option<u64>,
        form: Result<Multipart, MultipartRejection>,
    ) -> Result<Validated<'a>, ApiError> {
        let limits = &self.state.limits;
        gopics_media::normalize::check_declared_length(content_length, limits)?;

        let mut form = form.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let mut picture = None;
        let mut text = String::new();

        while let Some(field) = form.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some(PICTURE_FIELD) => picture = Some(field.bytes().await.map_err(multipart_error)?),
                Some(TEXT_FIELD) => text = field.text().await.map_err(multipart_error)?,
                _ => {}
            }
        }

        let picture = picture.ok_or_else(|| ApiError::BadRequest("missing picture field".into()))?;
        if picture.len() as u64 > limits.max_bytes {
            return Err(ApiError::PayloadTooLarge);
        }

        debug!("Upload from {} validated: {} bytes", self.uploader, picture.len());
        Ok(Validated {
            state: self.state,
            uploader: self.uploader,
            picture,
            text,
        })
    }
}

impl<'a> Validated<'a> {
    /// Decode, bound and re-encode the picture off the async runtime.
    pub async fn normalize(self) -> Result<Normalized<'a>, ApiError> {
        let limits = self.state.limits;
        let picture = self.picture;
        let image = tokio::task::spawn_blocking(move || gopics_media::normalize(&picture, &limits))
            .await
            .map_err(|e| ApiError::Internal(format!("normalize task failed: {e}")))??;

        debug!("Upload from {} normalized to {}x{}", self.uploader, image.width, image.height);
        Ok(Normalized {
            state: self.state,
            uploader: self.uploader,
            image,
            text: self.text,
        })
    }
}

impl Normalized<'_> {
    /// Write the picture, then publish the post on the uploader's timeline.
    ///
    /// If publishing fails the picture is removed again.
    pub async fn commit(self) -> Result<Committed, ApiError> {
        let state = self.state;
        let author = state
            .db
            .get_user(&self.uploader)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("session user {} has no record", self.uploader)))?;

        let name = format!("{}.{}", Uuid::new_v4(), CANONICAL_EXTENSION);
        state
            .media
            .write(&name, &self.image.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("writing media {name}: {e}")))?;

        let post = new_post(&author, name.clone(), self.text);
        if let Err(e) = state
            .db
            .commit_post(post.clone(), &author.name, Utc::now().timestamp())
            .await
        {
            if let Err(cleanup) = state.media.delete(&name).await {
                warn!("Failed to remove orphaned media {}: {}", name, cleanup);
            }
            return Err(ApiError::Internal(format!("committing post {name}: {e}")));
        }

        info!("Post {} published on timeline of {}", name, author.name);
        Ok(Committed {
            owner: author.name,
            post,
        })
    }
}

fn new_post(author: &User, name: String, text: String) -> Post {
    Post {
        author_name: author.name.clone(),
        author_pic_url: author.pic_url.clone(),
        name,
        text,
        time: Local::now().format(TIME_LAYOUT).to_string(),
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}
