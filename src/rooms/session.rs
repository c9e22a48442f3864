use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    db::{Message, ProfileId, RoomId},
    error::MessagingError,
    feed::{ChangeFeed, ChannelKey, EventFilter, RowInsert, Subscription},
    profiles,
};

use super::{
    log, members, msg,
    reconcile::{LocalId, RoomView, ViewEvent},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Subscribing,
    Subscribed,
    /// No live feed: history and own sends only, until a resubscribe works.
    Degraded(String),
}

/// One mounted room view: its message list plus its change-feed subscription.
///
/// Every change to the list goes through [`RoomSession::apply`].
pub struct RoomSession {
    db_pool: SqlitePool,
    feed: ChangeFeed,
    channel: ChannelKey,
    view: RoomView,
    state: SubscriberState,
    subscription: Option<Subscription>,
    next_local_id: LocalId,
}

impl RoomSession {
    pub async fn open(db_pool: SqlitePool, feed: ChangeFeed, room_id: RoomId, me: ProfileId) -> Result<Self, MessagingError> {
        let peer = members::get_peer(&db_pool, room_id, me).await?;
        let me = profiles::get_profile(&db_pool, me)
            .await?
            .ok_or(MessagingError::Unauthenticated)?;

        let mut session = RoomSession {
            db_pool,
            feed,
            channel: ChannelKey::for_pair(me.profile_id, peer.profile_id),
            view: RoomView::new(room_id, me, peer),
            state: SubscriberState::Disconnected,
            subscription: None,
            next_local_id: 1,
        };

        // subscribe before reading history so nothing falls in between
        session.subscribe();
        let history = log::list_messages(&session.db_pool, room_id).await?;
        session.apply(ViewEvent::HistoryLoaded(history));

        Ok(session)
    }

    pub fn view(&self) -> &RoomView {
        &self.view
    }

    pub fn state(&self) -> &SubscriberState {
        &self.state
    }

    pub fn channel(&self) -> ChannelKey {
        self.channel
    }

    pub fn apply(&mut self, event: ViewEvent) {
        self.view = self.view.reduce(event);
    }

    fn subscribe(&mut self) {
        self.state = SubscriberState::Subscribing;
        match self.feed.subscribe(self.channel, EventFilter::MESSAGE_INSERTS) {
            Ok(subscription) => {
                info!("room {} listening on {}", self.view.room_id(), self.channel);
                self.subscription = Some(subscription);
                self.state = SubscriberState::Subscribed;
            }
            Err(err) => {
                warn!("room {} running without live updates: {err}", self.view.room_id());
                self.state = SubscriberState::Degraded(err.to_string());
            }
        }
    }

    /// Retries a failed subscription, then reloads history to pick up what
    /// arrived while degraded. Does nothing while subscribed.
    pub async fn resubscribe(&mut self) -> Result<&SubscriberState, MessagingError> {
        if self.subscription.is_some() {
            return Ok(&self.state);
        }

        self.subscribe();
        if self.subscription.is_some() {
            let history = log::list_messages(&self.db_pool, self.view.room_id()).await?;
            self.apply(ViewEvent::HistoryLoaded(history));
        }
        Ok(&self.state)
    }

    /// Next message from the feed. Never resolves while degraded.
    pub async fn next_feed_message(&mut self) -> Option<Message> {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };

        let row = subscription.recv().await;
        match row {
            Some(RowInsert::Message(message)) => Some(message),
            None => {
                warn!("feed for room {} went away", self.view.room_id());
                self.subscription = None;
                self.state = SubscriberState::Degraded("live updates were interrupted".to_owned());
                None
            }
        }
    }

    /// Shows `content` as pending right away; [`RoomSession::finish_send`] stores it.
    pub fn begin_send(&mut self, content: &str) -> Result<LocalId, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::ValidationError("message can't be empty".to_owned()));
        }

        let local_id = self.next_local_id;
        self.next_local_id += 1;
        self.apply(ViewEvent::OptimisticSent {
            local_id,
            content: content.to_owned(),
            at: OffsetDateTime::now_utc(),
        });
        Ok(local_id)
    }

    pub async fn finish_send(&mut self, local_id: LocalId) -> Result<Message, MessagingError> {
        let Some(entry) = self.view.local_entry(local_id) else {
            return Err(MessagingError::ValidationError(format!("no pending message {local_id}")));
        };
        let content = entry.content.clone();
        let room_id = self.view.room_id();
        let sender = self.view.me().profile_id;

        match msg::send_msg(&self.db_pool, &self.feed, room_id, sender, &content).await {
            Ok(message) => {
                self.apply(ViewEvent::SendConfirmed { local_id, message: message.clone() });
                Ok(message)
            }
            Err(err) => {
                self.apply(ViewEvent::SendFailed { local_id, reason: err.to_string() });
                Err(err)
            }
        }
    }

    /// Releases the subscription. Also happens on drop.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
        self.state = SubscriberState::Disconnected;
    }
}
