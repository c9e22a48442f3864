//! Merges server history, local optimistic sends and change-feed echoes into
//! one ordered, duplicate-free message list.
//!
//! Confirmed entries are kept sorted by `(created_at, id)`. Entries that only
//! exist locally (pending or failed) follow them in send order, so the list is
//! never out of creation order.
//!
//! Until the server id of a pending send is known, an incoming message is
//! matched to it by room, sender and content within [`RECONCILE_WINDOW`]. Two
//! identical texts sent in quick succession can therefore be matched to each
//! other's pending entry; both still end up confirmed exactly once.

use time::{Duration, OffsetDateTime};

use crate::db::{Message, MessageId, Profile, ProfileId, RoomId};

pub const RECONCILE_WINDOW: Duration = Duration::seconds(30);

pub type LocalId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Confirmed,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Server(MessageId),
    Local(LocalId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessageView {
    pub key: EntryKey,
    pub room_id: RoomId,
    pub sender_id: ProfileId,
    pub sender_name: String,
    pub avatar: Option<String>,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub delivery: Delivery,
    pub is_current_user: bool,
}

impl ClientMessageView {
    fn order_key(&self) -> (OffsetDateTime, i64) {
        match self.key {
            EntryKey::Server(id) => (self.created_at, id.0),
            EntryKey::Local(_) => (self.created_at, i64::MAX),
        }
    }

    /// Whether `message` is the server's copy of this pending send.
    fn echoed_by(&self, message: &Message) -> bool {
        self.delivery == Delivery::Pending
            && self.room_id == message.room_id
            && self.sender_id == message.sender_id
            && self.content == message.content
            && (message.created_at - self.created_at).abs() <= RECONCILE_WINDOW
    }
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    HistoryLoaded(Vec<Message>),
    OptimisticSent {
        local_id: LocalId,
        content: String,
        at: OffsetDateTime,
    },
    SendConfirmed {
        local_id: LocalId,
        message: Message,
    },
    SendFailed {
        local_id: LocalId,
        reason: String,
    },
    FeedReceived(Message),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    room_id: RoomId,
    me: Profile,
    peer: Profile,
    confirmed: Vec<ClientMessageView>,
    local: Vec<ClientMessageView>,
}

impl RoomView {
    pub fn new(room_id: RoomId, me: Profile, peer: Profile) -> Self {
        RoomView {
            room_id,
            me,
            peer,
            confirmed: Vec::new(),
            local: Vec::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn me(&self) -> &Profile {
        &self.me
    }

    pub fn peer(&self) -> &Profile {
        &self.peer
    }

    pub fn entries(&self) -> impl Iterator<Item = &ClientMessageView> {
        self.confirmed.iter().chain(self.local.iter())
    }

    pub fn len(&self) -> usize {
        self.confirmed.len() + self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.confirmed.iter().any(|entry| entry.key == EntryKey::Server(id))
    }

    pub fn local_entry(&self, local_id: LocalId) -> Option<&ClientMessageView> {
        self.local.iter().find(|entry| entry.key == EntryKey::Local(local_id))
    }

    #[must_use]
    pub fn reduce(&self, event: ViewEvent) -> RoomView {
        let mut next = self.clone();
        next.apply(event);
        next
    }

    fn apply(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::HistoryLoaded(messages) => {
                for message in messages {
                    self.absorb(message);
                }
            }
            ViewEvent::OptimisticSent { local_id, content, at } => {
                if self.local_entry(local_id).is_some() {
                    return;
                }
                let entry = ClientMessageView {
                    key: EntryKey::Local(local_id),
                    room_id: self.room_id,
                    sender_id: self.me.profile_id,
                    sender_name: self.me.name.clone(),
                    avatar: self.me.avatar.clone(),
                    content,
                    created_at: at,
                    delivery: Delivery::Pending,
                    is_current_user: true,
                };
                self.local.push(entry);
            }
            ViewEvent::SendConfirmed { local_id, message } => {
                self.local.retain(|entry| entry.key != EntryKey::Local(local_id));
                if message.room_id == self.room_id && !self.contains(message.id) {
                    self.insert_confirmed(message);
                }
            }
            ViewEvent::SendFailed { local_id, reason } => {
                if let Some(entry) = self.local.iter_mut().find(|entry| entry.key == EntryKey::Local(local_id)) {
                    entry.delivery = Delivery::Failed { reason };
                }
            }
            ViewEvent::FeedReceived(message) => self.absorb(message),
        }
    }

    /// Takes in a message known to the server, replacing its pending copy if any.
    fn absorb(&mut self, message: Message) {
        if message.room_id != self.room_id || self.contains(message.id) {
            return;
        }
        if let Some(pos) = self.local.iter().position(|entry| entry.echoed_by(&message)) {
            self.local.remove(pos);
        }
        self.insert_confirmed(message);
    }

    fn insert_confirmed(&mut self, message: Message) {
        let entry = self.entry_for(message);
        let key = entry.order_key();
        let pos = self.confirmed.partition_point(|other| other.order_key() <= key);
        self.confirmed.insert(pos, entry);
    }

    fn entry_for(&self, message: Message) -> ClientMessageView {
        let is_current_user = message.sender_id == self.me.profile_id;
        let (sender_name, avatar) = if is_current_user {
            (self.me.name.clone(), self.me.avatar.clone())
        } else if message.sender_id == self.peer.profile_id {
            (self.peer.name.clone(), self.peer.avatar.clone())
        } else {
            ("Unknown".to_owned(), None)
        };

        ClientMessageView {
            key: EntryKey::Server(message.id),
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name,
            avatar,
            content: message.content,
            created_at: message.created_at,
            delivery: Delivery::Confirmed,
            is_current_user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: RoomId = RoomId(42);

    fn profile(name: &str) -> Profile {
        Profile {
            profile_id: ProfileId::new(),
            name: name.to_owned(),
            username: name.to_lowercase(),
            avatar: None,
        }
    }

    fn at(second: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_745_566_000 + second).unwrap()
    }

    fn message(id: i64, sender: &Profile, content: &str, second: i64) -> Message {
        Message {
            id: MessageId(id),
            room_id: ROOM,
            sender_id: sender.profile_id,
            content: content.to_owned(),
            created_at: at(second),
        }
    }

    fn view() -> (RoomView, Profile, Profile) {
        let (me, peer) = (profile("U1"), profile("U2"));
        (RoomView::new(ROOM, me.clone(), peer.clone()), me, peer)
    }

    fn contents(view: &RoomView) -> Vec<(&str, Delivery)> {
        view.entries().map(|e| (e.content.as_str(), e.delivery.clone())).collect()
    }

    fn is_sorted(view: &RoomView) -> bool {
        let keys: Vec<_> = view.entries().map(ClientMessageView::order_key).collect();
        keys.windows(2).all(|pair| pair[0] <= pair[1])
    }

    #[test]
    fn history_is_sorted_and_deduplicated() {
        let (view, me, peer) = view();
        let view = view.reduce(ViewEvent::HistoryLoaded(vec![
            message(3, &peer, "third", 20),
            message(1, &me, "first", 10),
            message(2, &peer, "second", 10),
            message(1, &me, "first", 10),
        ]));

        assert_eq!(view.len(), 3);
        let ids: Vec<_> = view.entries().map(|e| e.key).collect();
        assert_eq!(ids, vec![
            EntryKey::Server(MessageId(1)),
            EntryKey::Server(MessageId(2)),
            EntryKey::Server(MessageId(3)),
        ]);
    }

    #[test]
    fn optimistic_send_then_confirm_then_echo_leaves_one_entry() {
        let (view, me, _) = view();

        let view = view.reduce(ViewEvent::OptimisticSent { local_id: 1, content: "hi".into(), at: at(0) });
        assert_eq!(contents(&view), vec![("hi", Delivery::Pending)]);
        assert!(view.entries().all(|e| e.is_current_user));

        let hi = message(7, &me, "hi", 1);
        let view = view.reduce(ViewEvent::SendConfirmed { local_id: 1, message: hi.clone() });
        let view = view.reduce(ViewEvent::FeedReceived(hi));
        assert_eq!(contents(&view), vec![("hi", Delivery::Confirmed)]);
    }

    #[test]
    fn echo_before_confirmation_replaces_the_pending_entry() {
        let (view, me, _) = view();
        let hi = message(7, &me, "hi", 1);

        let view = view
            .reduce(ViewEvent::OptimisticSent { local_id: 1, content: "hi".into(), at: at(0) })
            .reduce(ViewEvent::FeedReceived(hi.clone()));
        assert_eq!(contents(&view), vec![("hi", Delivery::Confirmed)]);

        let view = view.reduce(ViewEvent::SendConfirmed { local_id: 1, message: hi });
        assert_eq!(contents(&view), vec![("hi", Delivery::Confirmed)]);
    }

    #[test]
    fn stale_echo_outside_the_window_is_not_matched_until_confirmed() {
        let (view, me, _) = view();
        let late = message(7, &me, "hi", RECONCILE_WINDOW.whole_seconds() + 5);

        let view = view
            .reduce(ViewEvent::OptimisticSent { local_id: 1, content: "hi".into(), at: at(0) })
            .reduce(ViewEvent::FeedReceived(late.clone()));
        assert_eq!(contents(&view), vec![("hi", Delivery::Confirmed), ("hi", Delivery::Pending)]);

        let view = view.reduce(ViewEvent::SendConfirmed { local_id: 1, message: late });
        assert_eq!(contents(&view), vec![("hi", Delivery::Confirmed)]);
    }

    #[test]
    fn repeated_feed_delivery_is_idempotent() {
        let (view, _, peer) = view();
        let yo = message(3, &peer, "yo", 5);

        let once = view.reduce(ViewEvent::FeedReceived(yo.clone()));
        let twice = once.reduce(ViewEvent::FeedReceived(yo));
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn out_of_order_feed_delivery_stays_sorted() {
        let (view, me, peer) = view();
        let view = view
            .reduce(ViewEvent::HistoryLoaded(vec![message(1, &me, "a", 1)]))
            .reduce(ViewEvent::FeedReceived(message(4, &peer, "d", 4)))
            .reduce(ViewEvent::FeedReceived(message(2, &peer, "b", 2)))
            .reduce(ViewEvent::FeedReceived(message(3, &me, "c", 3)));

        assert!(is_sorted(&view));
        let text: String = view.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(text, "abcd");
    }

    #[test]
    fn peer_message_lands_before_pending_sends() {
        let (view, _, peer) = view();
        let view = view
            .reduce(ViewEvent::OptimisticSent { local_id: 1, content: "mine".into(), at: at(10) })
            .reduce(ViewEvent::FeedReceived(message(5, &peer, "theirs", 11)));

        assert_eq!(contents(&view), vec![("theirs", Delivery::Confirmed), ("mine", Delivery::Pending)]);
        assert_eq!(view.entries().next().map(|e| e.sender_name.as_str()), Some("U2"));
    }

    #[test]
    fn other_rooms_are_ignored() {
        let (view, _, peer) = view();
        let mut elsewhere = message(9, &peer, "psst", 1);
        elsewhere.room_id = RoomId(43);

        let view = view.reduce(ViewEvent::FeedReceived(elsewhere));
        assert!(view.is_empty());
    }

    #[test]
    fn failed_send_stays_visible() {
        let (view, _, _) = view();
        let view = view
            .reduce(ViewEvent::OptimisticSent { local_id: 1, content: "hi".into(), at: at(0) })
            .reduce(ViewEvent::SendFailed { local_id: 1, reason: "offline".into() });

        assert_eq!(contents(&view), vec![("hi", Delivery::Failed { reason: "offline".into() })]);
    }

    #[test]
    fn identical_quick_sends_each_confirm_once() {
        let (view, me, _) = view();
        let first = message(7, &me, "ok", 1);
        let second = message(8, &me, "ok", 2);

        let view = view
            .reduce(ViewEvent::OptimisticSent { local_id: 1, content: "ok".into(), at: at(0) })
            .reduce(ViewEvent::OptimisticSent { local_id: 2, content: "ok".into(), at: at(0) })
            .reduce(ViewEvent::FeedReceived(second.clone()))
            .reduce(ViewEvent::FeedReceived(first.clone()))
            .reduce(ViewEvent::SendConfirmed { local_id: 1, message: first })
            .reduce(ViewEvent::SendConfirmed { local_id: 2, message: second });

        assert_eq!(contents(&view), vec![("ok", Delivery::Confirmed), ("ok", Delivery::Confirmed)]);
        assert!(is_sorted(&view));
    }
}
