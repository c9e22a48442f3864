#![allow(dead_code)]

use sqlx::SqlitePool;
use wemake::{
    db::{self, Profile, RoomId},
    feed::ChangeFeed,
    profiles, rooms,
};

pub async fn pool() -> SqlitePool {
    let db_pool = db::connect("sqlite::memory:").await.expect("in-memory database");
    db::init_schema(&db_pool).await.expect("schema");
    db_pool
}

pub fn feed() -> ChangeFeed {
    ChangeFeed::new(16, 16)
}

pub async fn profile(db_pool: &SqlitePool, username: &str) -> Profile {
    profiles::create_profile(db_pool, username, Some(username), None)
        .await
        .expect("profile")
}

/// Two profiles sharing a fresh room.
pub async fn room_with_pair(db_pool: &SqlitePool) -> (RoomId, Profile, Profile) {
    let u1 = profile(db_pool, "u1").await;
    let u2 = profile(db_pool, "u2").await;
    let room_id = rooms::find_or_create_room(db_pool, u1.profile_id, u2.profile_id)
        .await
        .expect("room");
    (room_id, u1, u2)
}
