use axum::{debug_handler, extract::{Query, State}, http::StatusCode, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{config::Config, include_res, profiles, session::RETURN_URL, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    username: String,
    name: Option<String>,
}

/// Only same-site paths are followed after login/logout.
pub(crate) fn local_path(return_url: Option<&str>) -> String {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") => url.to_owned(),
        _ => "/".to_owned(),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn login_page(
    State(config): State<Config>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    session: Session,
) -> AppResult<Response> {
    if !config.dev_login {
        return Ok((StatusCode::NOT_FOUND, "sign in through the identity provider").into_response());
    }

    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, local_path(Some(&return_url))).await?;
    }

    Ok(Html(include_res!(str, "/pages/login.html")).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(config): State<Config>,
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(LoginForm { username, name }): Form<LoginForm>,
) -> AppResult<Response> {
    if !config.dev_login {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let profile = match profiles::find_by_username(&db_pool, username.trim()).await? {
        Some(profile) => profile,
        None => profiles::create_profile(&db_pool, &username, name.as_deref(), None).await?,
    };

    let return_url = session.remove::<String>(RETURN_URL).await?;
    super::sign_in(&session, profile.profile_id).await?;
    info!("welcome @{}, {}", profile.username, profile.name);

    Ok(Redirect::to(local_path(return_url.as_deref()).as_str()).into_response())
}
