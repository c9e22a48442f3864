use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, db::ProfileId, AppResult};

use super::members;

/// Opens (or reopens) the conversation with another profile.
#[debug_handler]
pub(crate) async fn message_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(profile_id): Path<ProfileId>,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;
    let room_id = members::find_or_create_room(&db_pool, me, profile_id).await?;

    Ok(Redirect::to(
        &format!("/m/{room_id}")
    ).into_response())
}
