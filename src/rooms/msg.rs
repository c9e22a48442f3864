use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::{
    db::{self, Message, MessageRow, ProfileId, RoomId},
    error::MessagingError,
    feed::{ChangeFeed, ChannelKey, RowInsert},
    include_res, res,
};

use super::{
    members,
    reconcile::{ClientMessageView, Delivery, EntryKey, RoomView},
};

pub async fn send_msg(
    db_pool: &SqlitePool,
    feed: &ChangeFeed,

    room_id: RoomId,
    sender_id: ProfileId,

    content: &str,
) -> Result<Message, MessagingError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(MessagingError::ValidationError("message can't be empty".to_owned()));
    }

    if !members::is_member(db_pool, room_id, sender_id).await? {
        warn!("{sender_id} tried to post in room {room_id} without being a member");
        return Err(MessagingError::ForbiddenSender { room: room_id, sender: sender_id });
    }

    let row: MessageRow = sqlx::query_as(
        r#"INSERT INTO messages (message_room_id,sender_id,content,created_at) VALUES (?,?,?,?)
        RETURNING message_id,message_room_id,sender_id,content,created_at"#
    )
        .bind(room_id.0)
        .bind(sender_id.to_string())
        .bind(content)
        .bind(db::now_millis())
        .fetch_one(db_pool)
        .await?;
    let message = Message::from_row(row)?;
    debug!("stored message {} in room {room_id}", message.id);

    let members = members::room_members(db_pool, room_id).await?;
    if let &[a, b] = members.as_slice() {
        feed.publish(ChannelKey::for_pair(a, b), RowInsert::Message(message.clone()));
    } else {
        warn!("room {room_id} has {} members, not publishing {}", members.len(), message.id);
    }

    Ok(message)
}

pub(crate) fn msg_to_html(entry: &ClientMessageView) -> String {
    let key = match entry.key {
        EntryKey::Server(id) => format!("m{id}"),
        EntryKey::Local(id) => format!("l{id}"),
    };
    // unconfirmed entries sit below everything confirmed, so no clock for them
    let (delivery, time) = match &entry.delivery {
        Delivery::Confirmed => ("confirmed", res::clock(entry.created_at)),
        Delivery::Pending => ("pending", "sending…".to_owned()),
        Delivery::Failed { reason } => ("failed", format!("not sent: {}", res::escape(reason))),
    };
    let side = if entry.is_current_user { "mine" } else { "theirs" };

    include_res!(str, "/pages/rooms/message.html")
        .replace("{key}", &key)
        .replace("{side}", side)
        .replace("{delivery}", delivery)
        .replace("{avatar}", &res::avatar_html(entry.avatar.as_deref(), &entry.sender_name))
        .replace("{time}", &time)
        .replace("{name}", &res::escape(&entry.sender_name))
        .replace("{content}", &res::render_content(&entry.content))
}

pub(crate) fn messages_html(view: &RoomView) -> String {
    view.entries().map(msg_to_html).collect()
}
