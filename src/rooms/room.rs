use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, db::RoomId, error::MessagingError, feed::ChangeFeed, include_res, profiles, res, AppResult, AppState};

use super::{log, members, msg, reconcile::{RoomView, ViewEvent}};

#[derive(Deserialize)]
pub(crate) struct SendMessageForm {
    message: String,
}

#[debug_handler]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<RoomId>,
) -> AppResult<Response> {
    let view = load_view(&db_pool, &session, room_id).await?;
    Ok(Html(room_html(&view, None)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    State(feed): State<ChangeFeed>,
    session: Session,
    Path(room_id): Path<RoomId>,

    Form(SendMessageForm { message }): Form<SendMessageForm>,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;

    match msg::send_msg(&db_pool, &feed, room_id, me, &message).await {
        Ok(_) => Ok(Redirect::to(&format!("/m/{room_id}")).into_response()),
        Err(MessagingError::ValidationError(reason)) => {
            let view = load_view(&db_pool, &session, room_id).await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(room_html(&view, Some(&reason)))).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

async fn load_view(db_pool: &SqlitePool, session: &Session, room_id: RoomId) -> AppResult<RoomView> {
    let me = auth::current_user(session).await?;
    let peer = members::get_peer(db_pool, room_id, me).await?;
    let me = profiles::get_profile(db_pool, me)
        .await?
        .ok_or(MessagingError::Unauthenticated)?;
    let history = log::list_messages(db_pool, room_id).await?;

    Ok(RoomView::new(room_id, me, peer).reduce(ViewEvent::HistoryLoaded(history)))
}

fn room_html(view: &RoomView, error: Option<&str>) -> String {
    let peer = view.peer();
    let error = error
        .map(|error| format!(r#"<p class="error">{}</p>"#, res::escape(error)))
        .unwrap_or_default();

    include_res!(str, "/pages/rooms/room.html")
        .replace("{room_id}", &view.room_id().to_string())
        .replace("{peer_id}", &peer.profile_id.to_string())
        .replace("{peer_avatar}", &res::avatar_html(peer.avatar.as_deref(), &peer.name))
        .replace("{peer_username}", &res::escape(&peer.username))
        .replace("{peer_name}", &res::escape(&peer.name))
        .replace("{error}", &error)
        .replace("{messages}", &msg::messages_html(view))
}
