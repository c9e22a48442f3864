use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, include_res, res, AppResult};

use super::{list_notifications, mark_seen, Notification};

#[debug_handler]
pub(crate) async fn notifications(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;

    let cards: String = list_notifications(&db_pool, me)
        .await?
        .iter()
        .map(card_html)
        .collect();
    let cards = if cards.is_empty() { "<p>Nothing new.</p>".to_owned() } else { cards };

    Ok(Html(
        include_res!(str, "/pages/notifications/list.html")
            .replace("{cards}", &cards)
    ).into_response())
}

#[debug_handler]
pub(crate) async fn see(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(notification_id): Path<i64>,
) -> AppResult<Response> {
    let me = auth::current_user(&session).await?;
    mark_seen(&db_pool, notification_id, me).await?;

    Ok(Redirect::to("/notifications").into_response())
}

fn card_html(notification: &Notification) -> String {
    let (avatar, username) = match &notification.source {
        Some(source) => (res::avatar_html(source.avatar.as_deref(), &source.name), source.name.as_str()),
        None => (res::avatar_html(None, "?"), "Someone"),
    };
    let payload = notification.kind.link()
        .map(|(href, title)| format!(r#"<a href="{}">{}</a>"#, res::escape(&href), res::escape(title)))
        .unwrap_or_default();
    let see_button = if notification.seen {
        String::new()
    } else {
        format!(
            r#"<form method="post" action="/notifications/{}/see" data-see><button type="submit" title="mark as seen">👁</button></form>"#,
            notification.id
        )
    };

    include_res!(str, "/pages/notifications/notification.html")
        .replace("{seen}", if notification.seen { "seen" } else { "unseen" })
        .replace("{avatar}", &avatar)
        .replace("{verb}", notification.kind.verb())
        .replace("{time}", &res::clock(notification.created_at))
        .replace("{see_button}", &see_button)
        .replace("{payload}", &payload)
        .replace("{username}", &res::escape(username))
}
