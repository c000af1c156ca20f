use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};

use gopics_crypto::{Keyring, password};
use gopics_db::Database;
use gopics_media::{ImageLimits, MediaStore};
use gopics_types::api::{LoginForm, RegisterForm};

use crate::error::ApiError;
use crate::registry::{self, Candidate, RegistryError};
use crate::{session, timeline_path};

pub const INVALID_LOGIN: &str = "Invalid username or password.";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub keyring: Keyring,
    pub media: MediaStore,
    pub limits: ImageLimits,
}

/// POST /registration
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let candidate = Candidate {
        name: form.name,
        email: form.email,
        password: form.password,
    };

    registry::validate(&state.db, &candidate)
        .await
        .map_err(registration_error)?;
    let user = registry::create(&state.db, candidate)
        .await
        .map_err(registration_error)?;

    log_in(&state, jar, &user.name)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let Some(user) = state.db.get_user(&form.name).await? else {
        debug!("Login for unknown user {}", form.name);
        return Err(ApiError::validation("/", INVALID_LOGIN));
    };

    let hash = String::from_utf8(user.password)
        .map_err(|_| ApiError::Internal(format!("password hash of {} is not UTF-8", user.name)))?;
    let attempt = form.password;
    let matches = tokio::task::spawn_blocking(move || password::verify_password(&hash, attempt.as_bytes()))
        .await
        .map_err(|e| ApiError::Internal(format!("password check failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if !matches {
        debug!("Wrong password for {}", user.name);
        return Err(ApiError::validation("/", INVALID_LOGIN));
    }

    log_in(&state, jar, &user.name)
}

/// GET /logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (session::end_session(jar), Redirect::to("/"))
}

fn log_in(state: &AppStateInner, jar: CookieJar, name: &str) -> Result<Response, ApiError> {
    let jar = session::start_session(jar, &state.keyring, name)
        .map_err(|e| ApiError::Internal(format!("issuing session for {name}: {e}")))?;

    info!("User {} logged in", name);
    Ok((jar, Redirect::to(&timeline_path(name))).into_response())
}

fn registration_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::Invalid(v) => ApiError::validation("/register", v.to_string()),
        RegistryError::Store(e) => e.into(),
        other => ApiError::Internal(other.to_string()),
    }
}
