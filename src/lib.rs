pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod index;
pub mod notifications;
pub mod profiles;
pub mod res;
pub mod rooms;
pub mod session;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Redirect, Response}, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::error;

use config::Config;
use error::MessagingError;
use feed::ChangeFeed;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub feed: ChangeFeed,
    pub config: Config,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        AppState {
            db_pool,
            feed: ChangeFeed::new(config.feed_capacity, config.feed_max_channels),
            config,
        }
    }
}

pub fn app(app_state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(app_state.config.session_minutes)));

    Router::new()
        .route("/", get(index::index))

        .merge(auth::router())
        .nest("/m", rooms::router())
        .nest("/p", profiles::router())
        .nest("/notifications", notifications::router())

        .with_state(app_state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<MessagingError>() {
            if let MessagingError::Unauthenticated = err {
                return Redirect::to("/login").into_response();
            }
            let status = err.status();
            if !status.is_server_error() {
                return (status, err.to_string()).into_response();
            }
        }

        error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(MessagingError);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
