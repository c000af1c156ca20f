use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use thiserror::Error;
use tracing::{debug, error};

use gopics_db::DbError;
use gopics_media::MediaError;

use crate::flash;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no valid session")]
    Unauthorized,
    #[error("{message}")]
    ValidationFailed { message: String, redirect_to: String },
    #[error("content length required")]
    LengthRequired,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("store inconsistency: {0}")]
    StoreInconsistency(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(redirect_to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            redirect_to: redirect_to.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ValidationFailed { .. } => StatusCode::SEE_OTHER,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StoreInconsistency(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Inconsistent(key) => Self::StoreInconsistency(key),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::LengthRequired => Self::LengthRequired,
            MediaError::PayloadTooLarge(_) => Self::PayloadTooLarge,
            MediaError::UnsupportedMedia(reason) => Self::UnsupportedMedia(reason),
            MediaError::EncodeFailure(reason) => Self::Internal(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::ValidationFailed {
                message,
                redirect_to,
            } => {
                let jar = flash::set_flash(CookieJar::new(), &message);
                (jar, Redirect::to(&redirect_to)).into_response()
            }
            Self::StoreInconsistency(ref key) => {
                error!("Timeline index references missing record {}", key);
                (status, "internal server error").into_response()
            }
            Self::Internal(ref reason) => {
                error!("Request failed: {}", reason);
                (status, "internal server error").into_response()
            }
            other => {
                debug!("Rejecting request: {}", other);
                let reason = status.canonical_reason().unwrap_or("error");
                (status, reason).into_response()
            }
        }
    }
}
