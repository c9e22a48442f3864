use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::MessagingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub Uuid);

impl ProfileId {
    pub fn new() -> Self {
        ProfileId(Uuid::now_v7())
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, MessagingError> {
        Uuid::parse_str(raw)
            .map(ProfileId)
            .map_err(MessagingError::corrupt)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub profile_id: ProfileId,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

pub(crate) type ProfileRow = (String, String, String, Option<String>);

impl Profile {
    pub(crate) fn from_row((profile_id, name, username, avatar): ProfileRow) -> Result<Self, MessagingError> {
        Ok(Profile {
            profile_id: ProfileId::parse(&profile_id)?,
            name,
            username,
            avatar,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: ProfileId,
    pub content: String,
    pub created_at: OffsetDateTime,
}

pub(crate) type MessageRow = (i64, i64, String, String, i64);

impl Message {
    pub(crate) fn from_row((id, room_id, sender_id, content, created_at): MessageRow) -> Result<Self, MessagingError> {
        Ok(Message {
            id: MessageId(id),
            room_id: RoomId(room_id),
            sender_id: ProfileId::parse(&sender_id)?,
            content,
            created_at: from_millis(created_at)?,
        })
    }

    /// Total order of messages within a room.
    pub fn order_key(&self) -> (OffsetDateTime, MessageId) {
        (self.created_at, self.id)
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_millis(millis: i64) -> Result<OffsetDateTime, MessagingError> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(MessagingError::corrupt)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    profile_id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    username TEXT NOT NULL UNIQUE,
    avatar TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS message_rooms (
    message_room_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS message_room_members (
    message_room_id INTEGER NOT NULL REFERENCES message_rooms (message_room_id) ON DELETE CASCADE,
    profile_id TEXT NOT NULL REFERENCES profiles (profile_id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (message_room_id, profile_id)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_room_id INTEGER NOT NULL REFERENCES message_rooms (message_room_id) ON DELETE CASCADE,
    sender_id TEXT NOT NULL REFERENCES profiles (profile_id) ON DELETE CASCADE,
    content TEXT NOT NULL CHECK (length(content) > 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_room_order
    ON messages (message_room_id, created_at, message_id);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT REFERENCES profiles (profile_id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES profiles (profile_id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('follow', 'review', 'reply')),
    product_id INTEGER,
    post_id INTEGER,
    payload_title TEXT,
    seen INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
"#;

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // every in-memory connection is its own database
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}
