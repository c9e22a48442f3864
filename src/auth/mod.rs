use axum::{routing::get, Router};
use tower_sessions::Session;

use crate::{db::ProfileId, error::MessagingError, session::PROFILE_ID, AppResult, AppState};

mod login;
mod logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
}

/// Profile behind the request's session cookie.
pub async fn current_user(session: &Session) -> AppResult<ProfileId> {
    match session.get::<ProfileId>(PROFILE_ID).await? {
        Some(profile_id) => Ok(profile_id),
        None => Err(MessagingError::Unauthenticated.into()),
    }
}

pub async fn sign_in(session: &Session, profile_id: ProfileId) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(PROFILE_ID, profile_id).await?;
    Ok(())
}
