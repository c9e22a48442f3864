use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, include_res, profiles, res, rooms, AppResult};

#[debug_handler]
pub async fn index(
    State(db_pool): State<SqlitePool>,
    session: Session
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;
    let Some(profile) = profiles::get_profile(&db_pool, me).await? else {
        session.flush().await?;
        return Err(crate::error::MessagingError::Unauthenticated.into());
    };

    let rooms = rooms::list_rooms(&db_pool, me).await?;

    Ok(
        Html(
            include_res!(str, "/pages/index.html")
                .replace("{profile_id}", &profile.profile_id.to_string())
                .replace("{room_count}", &rooms.len().to_string())
                .replace("{alias}", &res::escape(&profile.name))
        ).into_response()
    )
}
