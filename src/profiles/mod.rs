mod page;

use axum::{routing::get, Router};
use rand::seq::IndexedRandom;
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    db::{self, Profile, ProfileId, ProfileRow},
    error::MessagingError,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{profile_id}", get(page::profile))
}

pub async fn get_profile(db_pool: &SqlitePool, profile_id: ProfileId) -> Result<Option<Profile>, MessagingError> {
    sqlx::query_as::<_, ProfileRow>("SELECT profile_id,name,username,avatar FROM profiles WHERE profile_id=?")
        .bind(profile_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .map(Profile::from_row)
        .transpose()
}

pub async fn find_by_username(db_pool: &SqlitePool, username: &str) -> Result<Option<Profile>, MessagingError> {
    sqlx::query_as::<_, ProfileRow>("SELECT profile_id,name,username,avatar FROM profiles WHERE username=?")
        .bind(username)
        .fetch_optional(db_pool)
        .await?
        .map(Profile::from_row)
        .transpose()
}

pub async fn create_profile(
    db_pool: &SqlitePool,
    username: &str,
    name: Option<&str>,
    avatar: Option<&str>,
) -> Result<Profile, MessagingError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(MessagingError::ValidationError("username can't be empty".to_owned()));
    }

    let name = match name {
        Some(name) if !name.trim().is_empty() => name.trim().to_owned(),
        _ => random_name(),
    };

    let profile = Profile {
        profile_id: ProfileId::new(),
        name,
        username: username.to_owned(),
        avatar: avatar.map(str::to_owned),
    };

    info!("adding @{}#{}, {}", profile.username, profile.profile_id, profile.name);
    sqlx::query("INSERT INTO profiles (profile_id,name,username,avatar,created_at) VALUES (?,?,?,?,?)")
        .bind(profile.profile_id.to_string())
        .bind(&profile.name)
        .bind(&profile.username)
        .bind(&profile.avatar)
        .bind(db::now_millis())
        .execute(db_pool)
        .await?;

    Ok(profile)
}

fn random_name() -> String {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Eager",
        ];

    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Owl", "Rabbit", "Falcon",
        "Hawk", "Panda", "Kitten", "Phoenix", "Turtle", "Dolphin", "Whale", "Zebra",
    ];

    let mut rng = rand::rng();
    format!(
        "{} {}",
        adjectives.choose(&mut rng).copied().unwrap_or("Nameless"),
        nouns.choose(&mut rng).copied().unwrap_or("Maker"),
    )
}
