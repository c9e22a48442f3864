use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, db::ProfileId, error::MessagingError, include_res, res, AppResult};

#[debug_handler]
pub(crate) async fn profile(
    Path(profile_id): Path<ProfileId>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;

    let Some(profile) = super::get_profile(&db_pool, profile_id).await? else {
        return Err(MessagingError::ProfileNotFound(profile_id).into());
    };

    let message_button = if profile.profile_id == me {
        String::new()
    } else {
        format!(r#"<form method="post" action="/m/with/{profile_id}"><button type="submit">Message</button></form>"#)
    };

    Ok(Html(
        include_res!(str, "/pages/profiles/profile.html")
        .replace("{avatar}", &res::avatar_html(profile.avatar.as_deref(), &profile.name))
        .replace("{message_button}", &message_button)
        .replace("{handle}", &res::escape(&profile.username))
        .replace("{alias}", &res::escape(&profile.name))
    ).into_response())
}
