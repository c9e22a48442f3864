use axum::{debug_handler, extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade}, response::{IntoResponse, Response}};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{debug, info};

use crate::{auth, db::RoomId, feed::ChangeFeed, res, AppResult, AppState};

use super::{msg, reconcile::ViewEvent, session::{RoomSession, SubscriberState}};

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Send { content: String },
    Resubscribe,
}

enum Step {
    Feed(Option<crate::db::Message>),
    Frame(Option<Result<Message, axum::Error>>),
}

#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<RoomId>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<ChangeFeed>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;
    let room = RoomSession::open(db_pool, feed, room_id, me).await?;

    Ok(ws.on_upgrade(move |socket| live_view(socket, room)).into_response())
}

async fn live_view(socket: WebSocket, mut room: RoomSession) {
    let room_id = room.view().room_id();
    info!("live view of room {room_id} opened");

    let (mut sender, mut receiver) = socket.split();
    if sender.send(render(&room, None).into()).await.is_err() {
        room.close();
        return;
    }

    loop {
        let step = tokio::select! {
            message = room.next_feed_message() => Step::Feed(message),
            frame = receiver.next() => Step::Frame(frame),
        };

        let mut notice = None;
        match step {
            Step::Feed(Some(message)) => room.apply(ViewEvent::FeedReceived(message)),
            // went degraded, the status line says so
            Step::Feed(None) => {}
            Step::Frame(Some(Ok(frame))) => {
                let Ok(frame) = serde_json::from_slice::<ClientFrame>(&frame.into_data()) else {
                    continue;
                };
                match frame {
                    ClientFrame::Send { content } => match room.begin_send(&content) {
                        Ok(local_id) => {
                            if sender.send(render(&room, None).into()).await.is_err() {
                                break;
                            }
                            if let Err(err) = room.finish_send(local_id).await {
                                debug!("send in room {room_id} failed: {err}");
                            }
                        }
                        Err(err) => notice = Some(err.to_string()),
                    },
                    ClientFrame::Resubscribe => {
                        if let Err(err) = room.resubscribe().await {
                            notice = Some(err.to_string());
                        }
                    }
                }
            }
            Step::Frame(_) => break,
        }

        if sender.send(render(&room, notice.as_deref()).into()).await.is_err() {
            break;
        }
    }

    room.close();
    info!("live view of room {room_id} closed");
}

fn render(room: &RoomSession, notice: Option<&str>) -> String {
    let status = match room.state() {
        SubscriberState::Subscribed => r#"<p id="feed-status" class="live">live</p>"#.to_owned(),
        SubscriberState::Disconnected | SubscriberState::Subscribing => {
            r#"<p id="feed-status">connecting…</p>"#.to_owned()
        }
        SubscriberState::Degraded(reason) => format!(
            r#"<p id="feed-status" class="degraded">Live updates unavailable ({}). New replies show up after a refresh. <button type="button" data-resubscribe>retry</button></p>"#,
            res::escape(reason)
        ),
    };
    let notice = notice
        .map(|notice| format!(r#"<p class="error">{}</p>"#, res::escape(notice)))
        .unwrap_or_default();

    format!(
        r#"{status}{notice}<div id="messages">{}</div>"#,
        msg::messages_html(room.view())
    )
}
