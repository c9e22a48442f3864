//! In-process change-feed: row-insert events fanned out per logical channel.
//!
//! Consumers must not rely on ordering or at-most-once delivery; a lagging
//! receiver simply skips what it missed.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{
    db::{Message, ProfileId},
    error::MessagingError,
};

/// Channel shared by both members of a room, whichever of them asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKey(ProfileId, ProfileId);

impl ChannelKey {
    pub fn for_pair(a: ProfileId, b: ProfileId) -> Self {
        if a <= b { ChannelKey(a, b) } else { ChannelKey(b, a) }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "room:{}-{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Messages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub table: Table,
    pub event: EventKind,
}

impl EventFilter {
    pub const MESSAGE_INSERTS: EventFilter = EventFilter {
        table: Table::Messages,
        event: EventKind::Insert,
    };

    pub fn matches(&self, row: &RowInsert) -> bool {
        self.event == EventKind::Insert && self.table == row.table()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowInsert {
    Message(Message),
}

impl RowInsert {
    pub fn table(&self) -> Table {
        match self {
            RowInsert::Message(_) => Table::Messages,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Inner>,
}

struct Inner {
    channels: Mutex<HashMap<ChannelKey, broadcast::Sender<RowInsert>>>,
    capacity: usize,
    max_channels: usize,
}

impl ChangeFeed {
    pub fn new(capacity: usize, max_channels: usize) -> Self {
        ChangeFeed {
            inner: Arc::new(Inner {
                channels: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                max_channels,
            }),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<ChannelKey, broadcast::Sender<RowInsert>>> {
        self.inner.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, key: ChannelKey, filter: EventFilter) -> Result<Subscription, MessagingError> {
        let mut channels = self.channels();

        let rx = match channels.get(&key) {
            Some(tx) => tx.subscribe(),
            None => {
                if channels.len() >= self.inner.max_channels {
                    return Err(MessagingError::SubscriptionFailure(format!(
                        "{key}: channel limit of {} reached",
                        self.inner.max_channels
                    )));
                }
                let (tx, rx) = broadcast::channel(self.inner.capacity);
                channels.insert(key, tx);
                rx
            }
        };

        debug!("subscribed to {key}");
        Ok(Subscription {
            key,
            filter,
            rx: Some(rx),
            feed: self.clone(),
        })
    }

    /// Returns how many subscribers the row was handed to.
    pub fn publish(&self, key: ChannelKey, row: RowInsert) -> usize {
        let channels = self.channels();
        let Some(tx) = channels.get(&key) else {
            return 0;
        };

        let delivered = tx.send(row).unwrap_or(0);
        debug!("published to {key} ({delivered} subscribers)");
        delivered
    }

    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    pub fn subscriber_count(&self, key: ChannelKey) -> usize {
        self.channels()
            .get(&key)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    fn release(&self, key: ChannelKey) {
        let mut channels = self.channels();
        if channels.get(&key).is_some_and(|tx| tx.receiver_count() == 0) {
            channels.remove(&key);
            debug!("dropped idle channel {key}");
        }
    }
}

/// A live subscription. Released on [`Subscription::close`] or drop.
pub struct Subscription {
    key: ChannelKey,
    filter: EventFilter,
    rx: Option<broadcast::Receiver<RowInsert>>,
    feed: ChangeFeed,
}

impl Subscription {
    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Next row matching the filter, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<RowInsert> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(row) if self.filter.matches(&row) => return Some(row),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} lagged, skipped {skipped} events", self.key);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(rx) = self.rx.take() {
            drop(rx);
            self.feed.release(self.key);
            debug!("released {}", self.key);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
