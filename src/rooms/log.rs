use sqlx::SqlitePool;

use crate::{
    db::{Message, MessageRow, RoomId},
    error::MessagingError,
};

/// Full history of a room, oldest first.
///
/// Unpaginated: long rooms are loaded whole.
pub async fn list_messages(db_pool: &SqlitePool, room_id: RoomId) -> Result<Vec<Message>, MessagingError> {
    sqlx::query_as::<_, MessageRow>(
        r#"SELECT message_id,message_room_id,sender_id,content,created_at FROM messages
        WHERE message_room_id=?
        ORDER BY created_at ASC, message_id ASC"#
    )
        .bind(room_id.0)
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .map(Message::from_row)
        .collect()
}
