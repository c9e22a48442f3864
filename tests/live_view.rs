mod common;

use common::*;
use futures_util::FutureExt;
use wemake::{
    error::MessagingError,
    feed::{ChangeFeed, ChannelKey, EventFilter},
    db::ProfileId,
    rooms::{self, Delivery, RoomSession, SubscriberState, ViewEvent},
};

fn contents(session: &RoomSession) -> Vec<(String, Delivery)> {
    session
        .view()
        .entries()
        .map(|entry| (entry.content.clone(), entry.delivery.clone()))
        .collect()
}

#[tokio::test]
async fn own_send_shows_pending_then_settles_to_one_entry() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, u1, _) = room_with_pair(&db_pool).await;

    let mut session = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u1.profile_id).await.unwrap();
    assert_eq!(session.state(), &SubscriberState::Subscribed);
    assert!(session.view().is_empty());

    let local_id = session.begin_send("hi").unwrap();
    assert_eq!(contents(&session), vec![("hi".to_owned(), Delivery::Pending)]);
    let pending = session.view().entries().next().unwrap();
    assert_eq!(pending.sender_id, u1.profile_id);
    assert!(pending.is_current_user);

    let sent = session.finish_send(local_id).await.unwrap();
    let echo = session.next_feed_message().await.unwrap();
    assert_eq!(echo.id, sent.id);
    session.apply(ViewEvent::FeedReceived(echo));

    assert_eq!(contents(&session), vec![("hi".to_owned(), Delivery::Confirmed)]);
}

#[tokio::test]
async fn peer_message_is_appended_once_in_order() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, u1, u2) = room_with_pair(&db_pool).await;
    rooms::send_msg(&db_pool, &feed, room_id, u2.profile_id, "earlier").await.unwrap();

    let mut session = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u2.profile_id).await.unwrap();
    assert_eq!(session.view().len(), 1);

    let sent = rooms::send_msg(&db_pool, &feed, room_id, u1.profile_id, "from u1").await.unwrap();
    let arrived = session.next_feed_message().await.unwrap();
    session.apply(ViewEvent::FeedReceived(arrived.clone()));
    session.apply(ViewEvent::FeedReceived(arrived));

    assert_eq!(session.view().len(), 2);
    let last = session.view().entries().last().unwrap();
    assert_eq!(last.content, sent.content);
    assert_eq!(last.sender_name, u1.name);
    assert!(!last.is_current_user);
}

#[tokio::test]
async fn both_members_share_one_channel_until_they_leave() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, u1, u2) = room_with_pair(&db_pool).await;

    let mine = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u1.profile_id).await.unwrap();
    let mut theirs = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u2.profile_id).await.unwrap();
    assert_eq!(mine.channel(), theirs.channel());
    assert_eq!(feed.channel_count(), 1);
    assert_eq!(feed.subscriber_count(mine.channel()), 2);

    let channel = mine.channel();
    drop(mine);
    assert_eq!(feed.subscriber_count(channel), 1);

    theirs.close();
    assert_eq!(theirs.state(), &SubscriberState::Disconnected);
    assert_eq!(feed.channel_count(), 0);
}

#[tokio::test]
async fn outsiders_cannot_open_a_room() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, _, _) = room_with_pair(&db_pool).await;
    let u3 = profile(&db_pool, "u3").await;

    let err = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u3.profile_id).await.err().unwrap();
    assert!(matches!(err, MessagingError::RoomNotFound(_)));
    assert_eq!(feed.channel_count(), 0);
}

#[tokio::test]
async fn blank_send_never_shows_up() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, u1, _) = room_with_pair(&db_pool).await;

    let mut session = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u1.profile_id).await.unwrap();
    let err = session.begin_send("   ").unwrap_err();
    assert!(matches!(err, MessagingError::ValidationError(_)));
    assert!(session.view().is_empty());
    assert!(rooms::list_messages(&db_pool, room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_send_stays_visible_as_failed() {
    let db_pool = pool().await;
    let feed = feed();
    let (room_id, u1, _) = room_with_pair(&db_pool).await;

    let mut session = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u1.profile_id).await.unwrap();
    let local_id = session.begin_send("into the void").unwrap();
    db_pool.close().await;

    assert!(session.finish_send(local_id).await.is_err());
    let entry = session.view().local_entry(local_id).unwrap();
    assert!(matches!(entry.delivery, Delivery::Failed { .. }));
    assert_eq!(session.view().len(), 1);
}

#[tokio::test]
async fn degraded_view_keeps_history_and_own_sends() {
    let db_pool = pool().await;
    let feed = ChangeFeed::new(16, 1);
    let (room_id, u1, u2) = room_with_pair(&db_pool).await;
    rooms::send_msg(&db_pool, &feed, room_id, u2.profile_id, "before").await.unwrap();

    let blocker = feed
        .subscribe(ChannelKey::for_pair(ProfileId::new(), ProfileId::new()), EventFilter::MESSAGE_INSERTS)
        .unwrap();

    let mut session = RoomSession::open(db_pool.clone(), feed.clone(), room_id, u1.profile_id).await.unwrap();
    assert!(matches!(session.state(), SubscriberState::Degraded(_)));
    assert_eq!(contents(&session), vec![("before".to_owned(), Delivery::Confirmed)]);

    let local_id = session.begin_send("still here").unwrap();
    session.finish_send(local_id).await.unwrap();
    assert_eq!(session.view().len(), 2);
    assert!(session.view().entries().all(|entry| entry.delivery == Delivery::Confirmed));

    rooms::send_msg(&db_pool, &feed, room_id, u2.profile_id, "unheard").await.unwrap();
    assert!(session.next_feed_message().now_or_never().is_none());
    assert_eq!(session.view().len(), 2);

    drop(blocker);
    assert_eq!(session.resubscribe().await.unwrap(), &SubscriberState::Subscribed);
    assert_eq!(session.view().len(), 3);

    rooms::send_msg(&db_pool, &feed, room_id, u2.profile_id, "heard").await.unwrap();
    let arrived = session.next_feed_message().await.unwrap();
    session.apply(ViewEvent::FeedReceived(arrived));
    assert_eq!(session.view().entries().last().map(|entry| entry.content.as_str()), Some("heard"));
    assert_eq!(session.view().len(), 4);
}
