mod page;

use axum::{routing::{get, post}, Router};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    db::{self, Profile, ProfileId},
    error::MessagingError,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::notifications))
        .route("/{notification_id}/see", post(page::see))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Follow,
    Review { product_id: i64, product_name: String },
    Reply { post_id: i64, post_title: String },
}

impl NotificationKind {
    fn tag(&self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Review { .. } => "review",
            NotificationKind::Reply { .. } => "reply",
        }
    }

    fn from_row(
        tag: &str,
        product_id: Option<i64>,
        post_id: Option<i64>,
        title: Option<String>,
    ) -> Result<Self, MessagingError> {
        match (tag, product_id, post_id) {
            ("follow", _, _) => Ok(NotificationKind::Follow),
            ("review", Some(product_id), _) => Ok(NotificationKind::Review {
                product_id,
                product_name: title.unwrap_or_default(),
            }),
            ("reply", _, Some(post_id)) => Ok(NotificationKind::Reply {
                post_id,
                post_title: title.unwrap_or_default(),
            }),
            _ => Err(MessagingError::CorruptRow(format!("notification of kind {tag} without its payload"))),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            NotificationKind::Follow => " followed you.",
            NotificationKind::Review { .. } => " reviewed your product: ",
            NotificationKind::Reply { .. } => " replied to your post: ",
        }
    }

    /// Where the payload lives, for kinds that have one.
    pub fn link(&self) -> Option<(String, &str)> {
        match self {
            NotificationKind::Follow => None,
            NotificationKind::Review { product_id, product_name } => Some((format!("/products/{product_id}"), product_name)),
            NotificationKind::Reply { post_id, post_title } => Some((format!("/community/{post_id}"), post_title)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub source: Option<Profile>,
    pub kind: NotificationKind,
    pub seen: bool,
    pub created_at: OffsetDateTime,
}

pub async fn create_notification(
    db_pool: &SqlitePool,
    source: Option<ProfileId>,
    target: ProfileId,
    kind: &NotificationKind,
) -> Result<i64, MessagingError> {
    let (product_id, post_id, title) = match kind {
        NotificationKind::Follow => (None, None, None),
        NotificationKind::Review { product_id, product_name } => (Some(*product_id), None, Some(product_name.as_str())),
        NotificationKind::Reply { post_id, post_title } => (None, Some(*post_id), Some(post_title.as_str())),
    };

    let (id,): (i64,) = sqlx::query_as(
        r#"INSERT INTO notifications (source_id,target_id,kind,product_id,post_id,payload_title,created_at)
        VALUES (?,?,?,?,?,?,?) RETURNING notification_id"#
    )
        .bind(source.map(|source| source.to_string()))
        .bind(target.to_string())
        .bind(kind.tag())
        .bind(product_id)
        .bind(post_id)
        .bind(title)
        .bind(db::now_millis())
        .fetch_one(db_pool)
        .await?;

    Ok(id)
}

/// Newest first.
pub async fn list_notifications(db_pool: &SqlitePool, target: ProfileId) -> Result<Vec<Notification>, MessagingError> {
    type Row = (i64, String, Option<i64>, Option<i64>, Option<String>, bool, i64, Option<String>, Option<String>, Option<String>, Option<String>);

    let rows: Vec<Row> = sqlx::query_as(
        r#"SELECT n.notification_id, n.kind, n.product_id, n.post_id, n.payload_title, n.seen, n.created_at,
            p.profile_id, p.name, p.username, p.avatar
        FROM notifications n
        LEFT JOIN profiles p ON p.profile_id = n.source_id
        WHERE n.target_id=?
        ORDER BY n.created_at DESC, n.notification_id DESC"#
    )
        .bind(target.to_string())
        .fetch_all(db_pool)
        .await?;

    rows.into_iter()
        .map(|(id, tag, product_id, post_id, title, seen, created_at, profile_id, name, username, avatar)| {
            let source = match (profile_id, name, username) {
                (Some(profile_id), Some(name), Some(username)) => Some(Profile::from_row((profile_id, name, username, avatar))?),
                _ => None,
            };
            Ok(Notification {
                id,
                source,
                kind: NotificationKind::from_row(&tag, product_id, post_id, title)?,
                seen,
                created_at: db::from_millis(created_at)?,
            })
        })
        .collect()
}

/// Only the target of a notification can mark it seen.
pub async fn mark_seen(db_pool: &SqlitePool, notification_id: i64, target: ProfileId) -> Result<(), MessagingError> {
    let result = sqlx::query("UPDATE notifications SET seen=1 WHERE notification_id=? AND target_id=?")
        .bind(notification_id)
        .bind(target.to_string())
        .execute(db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MessagingError::NotificationNotFound(notification_id));
    }
    Ok(())
}
