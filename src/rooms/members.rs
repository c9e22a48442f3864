use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    db::{self, Profile, ProfileId, RoomId},
    error::MessagingError,
    profiles,
};

/// A room as listed for one of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub peer: Profile,
    pub last_message: Option<String>,
    pub last_activity: OffsetDateTime,
}

pub async fn room_members(db_pool: &SqlitePool, room_id: RoomId) -> Result<Vec<ProfileId>, MessagingError> {
    sqlx::query_as::<_, (String,)>("SELECT profile_id FROM message_room_members WHERE message_room_id=? ORDER BY profile_id")
        .bind(room_id.0)
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .map(|(profile_id,)| ProfileId::parse(&profile_id))
        .collect()
}

pub async fn is_member(db_pool: &SqlitePool, room_id: RoomId, profile_id: ProfileId) -> Result<bool, MessagingError> {
    Ok(
        sqlx::query_as::<_, (i64,)>("SELECT 1 FROM message_room_members WHERE message_room_id=? AND profile_id=?")
            .bind(room_id.0)
            .bind(profile_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_some()
    )
}

/// The other member of a two-party room.
pub async fn get_peer(db_pool: &SqlitePool, room_id: RoomId, caller: ProfileId) -> Result<Profile, MessagingError> {
    let members = room_members(db_pool, room_id).await?;
    if !members.contains(&caller) {
        return Err(MessagingError::RoomNotFound(room_id));
    }

    let invariant = MessagingError::MembershipInvariantViolation {
        room: room_id,
        members: members.len(),
    };
    if members.len() != 2 {
        return Err(invariant);
    }
    let Some(peer) = members.into_iter().find(|member| *member != caller) else {
        return Err(invariant);
    };

    profiles::get_profile(db_pool, peer).await?.ok_or(invariant)
}

/// Room whose members are exactly `{a, b}`, created if there is none yet.
pub async fn find_or_create_room(db_pool: &SqlitePool, a: ProfileId, b: ProfileId) -> Result<RoomId, MessagingError> {
    if a == b {
        return Err(MessagingError::ValidationError("can't message yourself".to_owned()));
    }
    if profiles::get_profile(db_pool, b).await?.is_none() {
        return Err(MessagingError::ProfileNotFound(b));
    }

    let existing: Option<(i64,)> = sqlx::query_as(
        r#"SELECT m1.message_room_id FROM message_room_members m1
        JOIN message_room_members m2 ON m2.message_room_id = m1.message_room_id
        WHERE m1.profile_id=? AND m2.profile_id=?
        AND (SELECT COUNT(*) FROM message_room_members m3 WHERE m3.message_room_id = m1.message_room_id) = 2
        ORDER BY m1.message_room_id
        LIMIT 1"#
    )
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_optional(db_pool)
        .await?;
    if let Some((room_id,)) = existing {
        return Ok(RoomId(room_id));
    }

    let now = db::now_millis();
    let mut tx = db_pool.begin().await?;
    let (room_id,): (i64,) = sqlx::query_as("INSERT INTO message_rooms (created_at) VALUES (?) RETURNING message_room_id")
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
    for member in [a, b] {
        sqlx::query("INSERT INTO message_room_members (message_room_id,profile_id,created_at) VALUES (?,?,?)")
            .bind(room_id)
            .bind(member.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("opened room {room_id} for {a} and {b}");
    Ok(RoomId(room_id))
}

/// The caller's rooms, most recently active first.
pub async fn list_rooms(db_pool: &SqlitePool, caller: ProfileId) -> Result<Vec<RoomSummary>, MessagingError> {
    let rows: Vec<(i64, String, String, String, Option<String>, Option<String>, i64)> = sqlx::query_as(
        r#"SELECT me.message_room_id, p.profile_id, p.name, p.username, p.avatar,
            (SELECT content FROM messages m WHERE m.message_room_id = me.message_room_id
                ORDER BY m.created_at DESC, m.message_id DESC LIMIT 1),
            COALESCE(
                (SELECT MAX(created_at) FROM messages m WHERE m.message_room_id = me.message_room_id),
                r.created_at
            ) AS last_activity
        FROM message_room_members me
        JOIN message_room_members other
            ON other.message_room_id = me.message_room_id AND other.profile_id != me.profile_id
        JOIN profiles p ON p.profile_id = other.profile_id
        JOIN message_rooms r ON r.message_room_id = me.message_room_id
        WHERE me.profile_id=?
        ORDER BY last_activity DESC, me.message_room_id DESC"#
    )
        .bind(caller.to_string())
        .fetch_all(db_pool)
        .await?;

    rows.into_iter()
        .map(|(room_id, profile_id, name, username, avatar, last_message, last_activity)| {
            Ok(RoomSummary {
                room_id: RoomId(room_id),
                peer: Profile::from_row((profile_id, name, username, avatar))?,
                last_message,
                last_activity: db::from_millis(last_activity)?,
            })
        })
        .collect()
}
