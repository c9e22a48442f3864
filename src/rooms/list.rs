use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, include_res, res, AppResult};

use super::members;

#[debug_handler]
pub(crate) async fn rooms(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;

    let mut room_items = String::new();
    for room in members::list_rooms(&db_pool, me).await? {
        let last_message = room.last_message.as_deref().unwrap_or("No messages yet");
        room_items += &include_res!(str, "/pages/rooms/room_item.html")
            .replace("{id}", &room.room_id.to_string())
            .replace("{avatar}", &res::avatar_html(room.peer.avatar.as_deref(), &room.peer.name))
            .replace("{when}", &res::clock(room.last_activity))
            .replace("{name}", &res::escape(&room.peer.name))
            .replace("{last_message}", &res::escape(last_message));
    }
    if room_items.is_empty() {
        room_items = "<li>No conversations yet.</li>".to_owned();
    }

    Ok(
        Html(
            include_res!(str, "/pages/rooms/list.html")
                .replace("{room_items}", &room_items)
        ).into_response()
    )
}
