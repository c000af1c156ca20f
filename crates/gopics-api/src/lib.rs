pub mod auth;
pub mod error;
pub mod flash;
pub mod ingest;
pub mod pages;
pub mod posts;
pub mod registry;
pub mod session;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::services::ServeDir;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Location of a user's timeline page.
pub fn timeline_path(name: &str) -> String {
    format!("/{}", urlencoding::encode(name))
}

/// All routes, without transport layers.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.limits.max_bytes).unwrap_or(usize::MAX);
    let media = ServeDir::new(state.media.dir());

    Router::new()
        .route("/", get(pages::index))
        .route("/register", get(pages::register))
        .route("/registration", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route(
            "/post",
            post(posts::create_post).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/{username}", get(pages::timeline))
        .nest_service("/media", media)
        .with_state(state)
}
