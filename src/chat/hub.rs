//! Broadcast hub.
//!
//! Fans newly appended messages out to live subscribers, scoped per room.
//!
//! Each room has a gate. Holding the gate (through [`RoomGuard`]) is the only
//! way to publish into a room or register a subscriber for it, so an append
//! that is published under the gate and a registration that reads the log head
//! under the gate are linearized: a subscriber either sees the message in the
//! log at registration time or receives it live, never neither and never both.
//!
//! The subscriber table itself sits behind a short synchronous lock that is
//! never held across an await point. Dropping a [`Subscription`] removes it
//! without waiting for the gate.
//!
//! Messages between a subscriber's resume position and the registered head
//! are read back from the log a chunk at a time, each chunk no larger than the
//! subscriber buffer, and only once the previous chunk has been consumed.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Context, Poll};

use futures::{FutureExt, Stream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::log::MessageLog;
use super::registry::RoomRegistry;
use super::types::Message;
use crate::db::DbPool;
use crate::{Result, RoomcastError};

/// Why a subscription stopped delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Cancelled by its owner.
    Unsubscribed,
    /// The room was deleted.
    RoomClosed,
    /// The subscriber fell too far behind and was dropped.
    Lagged,
    /// The subscriber's user is no longer a participant.
    Revoked,
    /// The hub was shut down.
    Shutdown,
    /// Catch-up messages could not be read from storage.
    Unavailable,
}

impl CloseReason {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Unsubscribed => "unsubscribed",
            CloseReason::RoomClosed => "room_closed",
            CloseReason::Lagged => "lagged",
            CloseReason::Revoked => "revoked",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Unavailable => "storage_unavailable",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Close state shared between the hub's entry and the subscription handle.
#[derive(Default)]
struct SubscriptionState {
    reason: Mutex<Option<CloseReason>>,
}

impl SubscriptionState {
    /// Record the first close reason; later ones are ignored.
    fn close(&self, reason: CloseReason) {
        let mut current = lock(&self.reason);
        if current.is_none() {
            *current = Some(reason);
        }
    }

    fn reason(&self) -> Option<CloseReason> {
        *lock(&self.reason)
    }
}

struct Subscriber {
    user_id: i64,
    tx: mpsc::Sender<Arc<Message>>,
    state: Arc<SubscriptionState>,
}

#[derive(Default)]
struct GateState {
    closed: bool,
}

/// Per-room serialization point and subscriber table.
struct RoomGate {
    room_id: i64,
    serial: Arc<tokio::sync::Mutex<GateState>>,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl RoomGate {
    fn new(room_id: i64) -> Self {
        Self {
            room_id,
            serial: Arc::new(tokio::sync::Mutex::new(GateState::default())),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn remove(&self, subscriber_id: u64) -> bool {
        lock(&self.subscribers).remove(&subscriber_id).is_some()
    }

    fn close_all(&self, reason: CloseReason) -> usize {
        let mut subscribers = lock(&self.subscribers);
        let count = subscribers.len();
        for (_, subscriber) in subscribers.drain() {
            subscriber.state.close(reason);
        }
        count
    }

    fn len(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

/// In-process fan-out of appended messages.
///
/// Created once at startup and shared by reference; see [`BroadcastHub::shutdown`].
pub struct BroadcastHub {
    rooms: RwLock<HashMap<i64, Arc<RoomGate>>>,
    buffer: usize,
    next_subscriber_id: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub whose subscribers may buffer up to `buffer` pending messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    async fn gate(&self, room_id: i64) -> Arc<RoomGate> {
        if let Some(gate) = self.rooms.read().await.get(&room_id) {
            return Arc::clone(gate);
        }

        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(room_id)
                .or_insert_with(|| Arc::new(RoomGate::new(room_id))),
        )
    }

    /// Enter a room's critical section.
    ///
    /// Fails with `NotFound` if the room was closed while waiting.
    pub async fn lock_room(&self, room_id: i64) -> Result<RoomGuard<'_>> {
        let gate = self.gate(room_id).await;
        let state = Arc::clone(&gate.serial).lock_owned().await;
        if state.closed {
            return Err(RoomcastError::NotFound("room".to_string()));
        }

        Ok(RoomGuard {
            hub: self,
            gate,
            state,
        })
    }

    /// Register a live subscriber for a room.
    ///
    /// Existence and participancy are checked again under the room's gate.
    /// The subscription yields every message above `resume_position`: the ones
    /// up to [`Subscription::registered_head`] are read back from the log,
    /// later ones are delivered live.
    pub async fn subscribe(
        &self,
        pool: &DbPool,
        room_id: i64,
        resume_position: i64,
        caller_id: i64,
    ) -> Result<Subscription> {
        let guard = self.lock_room(room_id).await?;

        // The room may have been deleted before its gate was ever opened
        let head = match MessageLog::new(pool).head(room_id).await {
            Ok(head) => head,
            Err(err @ RoomcastError::NotFound(_)) => {
                guard.close().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        if !RoomRegistry::new(pool)
            .is_participant(room_id, caller_id)
            .await?
        {
            return Err(RoomcastError::Authorization(
                "not a participant of this room".to_string(),
            ));
        }

        Ok(guard.register(pool, caller_id, resume_position, head))
    }

    /// Cancel a subscription. Nothing is delivered to it afterwards.
    pub fn unsubscribe(&self, subscription: Subscription) {
        subscription.cancel();
    }

    /// Number of live subscribers of a room.
    pub async fn subscriber_count(&self, room_id: i64) -> usize {
        match self.rooms.read().await.get(&room_id) {
            Some(gate) => gate.len(),
            None => 0,
        }
    }

    /// Number of rooms with an open gate.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Close every room's gate and end all subscriptions.
    pub async fn shutdown(&self) {
        let gates: Vec<Arc<RoomGate>> = self.rooms.write().await.drain().map(|(_, g)| g).collect();

        let mut closed = 0;
        for gate in gates {
            let mut state = Arc::clone(&gate.serial).lock_owned().await;
            state.closed = true;
            closed += gate.close_all(CloseReason::Shutdown);
        }

        info!("Broadcast hub shut down ({} subscriptions closed)", closed);
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one room's gate.
///
/// Appends must publish while holding the guard that was held during the
/// append itself.
pub struct RoomGuard<'a> {
    hub: &'a BroadcastHub,
    gate: Arc<RoomGate>,
    state: OwnedMutexGuard<GateState>,
}

impl RoomGuard<'_> {
    /// Room this guard belongs to.
    pub fn room_id(&self) -> i64 {
        self.gate.room_id
    }

    /// Deliver a message to the room's subscribers.
    ///
    /// Subscribers whose user is not in `participants` are dropped with
    /// [`CloseReason::Revoked`]. A subscriber whose buffer is full is dropped
    /// with [`CloseReason::Lagged`]; the others still receive the message.
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, message: Arc<Message>, participants: &BTreeSet<i64>) -> usize {
        debug_assert_eq!(message.room_id, self.gate.room_id);

        let mut delivered = 0;
        let mut subscribers = lock(&self.gate.subscribers);
        subscribers.retain(|id, subscriber| {
            if !participants.contains(&subscriber.user_id) {
                debug!(
                    room_id = self.gate.room_id,
                    subscriber = id,
                    "Dropping subscriber that is no longer a participant"
                );
                subscriber.state.close(CloseReason::Revoked);
                return false;
            }

            match subscriber.tx.try_send(Arc::clone(&message)) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        room_id = self.gate.room_id,
                        subscriber = id,
                        user_id = subscriber.user_id,
                        "Subscriber lagging behind, dropping it"
                    );
                    subscriber.state.close(CloseReason::Lagged);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    subscriber.state.close(CloseReason::Unsubscribed);
                    false
                }
            }
        });

        delivered
    }

    /// Add a subscriber whose log head at registration is `head`.
    ///
    /// The resume position is clamped into `[0, head]`. Messages above it and
    /// up to `head` are fetched from `pool` as the subscriber drains.
    pub fn register(
        &self,
        pool: &DbPool,
        user_id: i64,
        resume_position: i64,
        head: i64,
    ) -> Subscription {
        let id = self.hub.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.hub.buffer);
        let state = Arc::new(SubscriptionState::default());

        lock(&self.gate.subscribers).insert(
            id,
            Subscriber {
                user_id,
                tx,
                state: Arc::clone(&state),
            },
        );

        debug!(
            room_id = self.gate.room_id,
            subscriber = id,
            user_id,
            head,
            "Subscriber registered"
        );

        let cursor = resume_position.clamp(0, head.max(0));
        Subscription {
            id,
            room_id: self.gate.room_id,
            user_id,
            gate: Arc::clone(&self.gate),
            state,
            rx,
            pool: pool.clone(),
            chunk: self.hub.buffer as i64,
            backlog: VecDeque::new(),
            backfilled: cursor,
            fetch: None,
            finished: false,
            cursor,
            head,
        }
    }

    /// Close the room: every subscriber ends with [`CloseReason::RoomClosed`]
    /// and later [`BroadcastHub::lock_room`] calls waiting on this gate fail.
    pub async fn close(mut self) -> usize {
        self.state.closed = true;
        let room_id = self.gate.room_id;
        let closed = self.gate.close_all(CloseReason::RoomClosed);

        let mut rooms = self.hub.rooms.write().await;
        if rooms
            .get(&room_id)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate))
        {
            rooms.remove(&room_id);
        }

        info!(room_id, closed, "Room gate closed");
        closed
    }
}

/// A live, cancellable sequence of a room's messages.
///
/// Yields messages in increasing position order, each at most once, starting
/// above the resume cursor. Once it yields `None` it is finished for good;
/// resume with a fresh subscription from [`Subscription::cursor`].
pub struct Subscription {
    id: u64,
    room_id: i64,
    user_id: i64,
    gate: Arc<RoomGate>,
    state: Arc<SubscriptionState>,
    rx: mpsc::Receiver<Arc<Message>>,
    pool: DbPool,
    chunk: i64,
    backlog: VecDeque<Arc<Message>>,
    /// Highest position already read back from the log.
    backfilled: i64,
    fetch: Option<JoinHandle<Result<Vec<Message>>>>,
    finished: bool,
    cursor: i64,
    head: i64,
}

impl Subscription {
    /// Room this subscription belongs to.
    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    /// Subscribed user.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Position of the last message yielded (or the resume position).
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Log head at the moment of registration.
    pub fn registered_head(&self) -> i64 {
        self.head
    }

    /// Why the subscription ended, if it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.state.reason()
    }

    /// Poll for the next message.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Arc<Message>>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            while let Some(message) = self.backlog.pop_front() {
                if message.position > self.cursor {
                    self.cursor = message.position;
                    return Poll::Ready(Some(message));
                }
            }
            // A deleted room's log is gone; nothing is left to catch up on
            if self.backfilled >= self.head || self.close_reason() == Some(CloseReason::RoomClosed)
            {
                break;
            }
            if let Err(err) = ready!(self.poll_backfill(cx)) {
                warn!(
                    room_id = self.room_id,
                    subscriber = self.id,
                    cursor = self.cursor,
                    "Catch-up read failed: {}",
                    err
                );
                self.finish(CloseReason::Unavailable);
                return Poll::Ready(None);
            }
        }

        loop {
            match ready!(self.rx.poll_recv(cx)) {
                Some(message) if message.position <= self.cursor => continue,
                Some(message) => {
                    self.cursor = message.position;
                    return Poll::Ready(Some(message));
                }
                None => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }

    /// Read the next chunk of the log into the backlog.
    ///
    /// The read runs on its own task so that a caller who stops polling does
    /// not keep a pooled connection checked out.
    fn poll_backfill(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let from = self.backfilled;
        let upto = from.saturating_add(self.chunk).min(self.head);

        let (pool, room_id) = (&self.pool, self.room_id);
        let fetch = self.fetch.get_or_insert_with(|| {
            let pool = pool.clone();
            tokio::spawn(async move { MessageLog::new(&pool).after(room_id, from, upto).await })
        });
        let joined = ready!(fetch.poll_unpin(cx));
        self.fetch = None;

        let messages = joined
            .map_err(|err| RoomcastError::Storage(format!("catch-up read aborted: {err}")))??;
        for message in messages {
            if message.room_id == self.room_id && message.position > from && message.position <= upto
            {
                self.backlog.push_back(Arc::new(message));
            }
        }
        self.backfilled = upto;

        Poll::Ready(Ok(()))
    }

    fn finish(&mut self, reason: CloseReason) {
        self.state.close(reason);
        self.gate.remove(self.id);
        self.backlog.clear();
        self.finished = true;
    }

    /// Receive the next message, or `None` once the subscription has ended.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        std::future::poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Cancel the subscription.
    pub fn cancel(self) {}
}

impl Stream for Subscription {
    type Item = Arc<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        if self.gate.remove(self.id) {
            debug!(
                room_id = self.room_id,
                subscriber = self.id,
                "Subscriber removed"
            );
        }
        self.state.close(CloseReason::Unsubscribed);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("room_id", &self.room_id)
            .field("user_id", &self.user_id)
            .field("cursor", &self.cursor)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser, UserRepository};
    use chrono::Utc;
    use futures::{FutureExt, StreamExt};

    fn message(room_id: i64, position: i64) -> Message {
        Message {
            id: room_id * 1000 + position,
            room_id,
            sender_id: 1,
            content: format!("m{position}"),
            sent_at: Utc::now(),
            position,
            read_by: BTreeSet::from([1]),
        }
    }

    fn everyone() -> BTreeSet<i64> {
        BTreeSet::from([1, 2, 3])
    }

    /// A pool that never connects; enough for subscribers with nothing to catch up on.
    fn idle_pool() -> DbPool {
        DbPool::connect_lazy("sqlite::memory:").unwrap()
    }

    struct SeededRoom {
        db: Database,
        id: i64,
        alice: i64,
        bob: i64,
    }

    impl SeededRoom {
        fn participants(&self) -> BTreeSet<i64> {
            BTreeSet::from([self.alice, self.bob])
        }
    }

    async fn seeded_room(count: usize) -> SeededRoom {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users
            .create(&NewUser::new("alice", "alice@example.com"))
            .await
            .unwrap()
            .id;
        let bob = users
            .create(&NewUser::new("bob", "bob@example.com"))
            .await
            .unwrap()
            .id;
        let id = RoomRegistry::new(db.pool())
            .create("general", &[bob], alice)
            .await
            .unwrap()
            .id;

        let log = MessageLog::new(db.pool());
        for i in 1..=count {
            log.append(id, alice, &format!("m{i}")).await.unwrap();
        }
        SeededRoom { db, id, alice, bob }
    }

    #[tokio::test]
    async fn test_publish_is_scoped_to_room() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let mut in_room = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);
        let mut elsewhere = hub.lock_room(2).await.unwrap().register(&pool, 2, 0, 0);

        let delivered = hub
            .lock_room(1)
            .await
            .unwrap()
            .publish(Arc::new(message(1, 1)), &everyone());
        assert_eq!(delivered, 1);

        assert_eq!(in_room.recv().await.unwrap().position, 1);
        assert!(elsewhere.recv().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_delivers_in_order_once() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let mut sub = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);

        {
            let guard = hub.lock_room(1).await.unwrap();
            for position in 1..=3 {
                guard.publish(Arc::new(message(1, position)), &everyone());
            }
            // A replayed position is ignored
            guard.publish(Arc::new(message(1, 2)), &everyone());
            guard.publish(Arc::new(message(1, 4)), &everyone());
        }

        let mut positions = Vec::new();
        for _ in 0..4 {
            positions.push(sub.recv().await.unwrap().position);
        }
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(sub.cursor(), 4);
    }

    #[tokio::test]
    async fn test_backlog_precedes_live() {
        let room = seeded_room(3).await;
        let hub = BroadcastHub::new(16);
        let mut sub = hub
            .subscribe(room.db.pool(), room.id, 1, room.bob)
            .await
            .unwrap();
        assert_eq!(sub.cursor(), 1);
        assert_eq!(sub.registered_head(), 3);

        {
            let guard = hub.lock_room(room.id).await.unwrap();
            // Position 3 is already covered by the log
            guard.publish(Arc::new(message(room.id, 3)), &room.participants());
            guard.publish(Arc::new(message(room.id, 4)), &room.participants());
        }

        let positions: Vec<_> = (&mut sub)
            .take(3)
            .map(|m| m.position)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(positions, vec![2, 3, 4]);
        assert_eq!(sub.recv().now_or_never(), None);
    }

    #[tokio::test]
    async fn test_catch_up_is_read_in_chunks() {
        let room = seeded_room(40).await;
        let hub = BroadcastHub::new(8);
        let mut sub = hub
            .subscribe(room.db.pool(), room.id, 0, room.bob)
            .await
            .unwrap();
        assert!(sub.backlog.is_empty());

        for expected in 1..=40 {
            let message = sub.recv().await.unwrap();
            assert_eq!(message.position, expected);
            assert!(sub.backlog.len() < 8);
        }
        assert_eq!(sub.backfilled, 40);
        assert!(sub.fetch.is_none());
    }

    #[tokio::test]
    async fn test_catch_up_failure_ends_subscription() {
        let room = seeded_room(5).await;
        let hub = BroadcastHub::new(16);
        let mut sub = hub
            .subscribe(room.db.pool(), room.id, 0, room.bob)
            .await
            .unwrap();

        sqlx::query("ALTER TABLE message_reads RENAME TO message_reads_off")
            .execute(room.db.pool())
            .await
            .unwrap();

        assert!(sub.recv().await.is_none());
        assert_eq!(sub.close_reason(), Some(CloseReason::Unavailable));
        assert_eq!(sub.cursor(), 0);
        assert_eq!(hub.subscriber_count(room.id).await, 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_to_deleted_room() {
        let room = seeded_room(2).await;
        let hub = BroadcastHub::new(16);
        RoomRegistry::new(room.db.pool())
            .delete(room.id, room.alice)
            .await
            .unwrap();

        let result = hub.subscribe(room.db.pool(), room.id, 0, room.bob).await;
        assert!(matches!(result, Err(RoomcastError::NotFound(_))));
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_requires_participant() {
        let room = seeded_room(0).await;
        let outsider = UserRepository::new(room.db.pool())
            .create(&NewUser::new("carol", "carol@example.com"))
            .await
            .unwrap()
            .id;
        let hub = BroadcastHub::new(16);

        let result = hub.subscribe(room.db.pool(), room.id, 0, outsider).await;
        assert!(matches!(result, Err(RoomcastError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_resume_position_is_clamped_to_head() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let guard = hub.lock_room(1).await.unwrap();
        assert_eq!(guard.register(&pool, 2, 50, 5).cursor(), 5);
        assert_eq!(guard.register(&pool, 2, -3, 5).cursor(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_isolated() {
        let hub = BroadcastHub::new(2);
        let pool = idle_pool();
        let mut slow = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);
        let mut fast = hub.lock_room(1).await.unwrap().register(&pool, 3, 0, 0);

        for position in 1..=3 {
            hub.lock_room(1)
                .await
                .unwrap()
                .publish(Arc::new(message(1, position)), &everyone());
            assert_eq!(fast.recv().await.unwrap().position, position);
        }

        // Buffered messages are still drained before the end
        assert_eq!(slow.recv().await.unwrap().position, 1);
        assert_eq!(slow.recv().await.unwrap().position, 2);
        assert!(slow.recv().await.is_none());
        assert_eq!(slow.close_reason(), Some(CloseReason::Lagged));
        assert_eq!(slow.cursor(), 2);

        assert_eq!(fast.close_reason(), None);
        assert_eq!(hub.subscriber_count(1).await, 1);
    }

    #[tokio::test]
    async fn test_non_participant_is_revoked() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let mut sub = hub.lock_room(1).await.unwrap().register(&pool, 9, 0, 0);

        let delivered = hub
            .lock_room(1)
            .await
            .unwrap()
            .publish(Arc::new(message(1, 1)), &everyone());
        assert_eq!(delivered, 0);
        assert!(sub.recv().await.is_none());
        assert_eq!(sub.close_reason(), Some(CloseReason::Revoked));
    }

    #[tokio::test]
    async fn test_close_room_ends_subscriptions() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let mut first = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);
        let mut second = hub.lock_room(1).await.unwrap().register(&pool, 3, 0, 0);

        let closed = hub.lock_room(1).await.unwrap().close().await;
        assert_eq!(closed, 2);

        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_none());
        assert_eq!(first.close_reason(), Some(CloseReason::RoomClosed));
        assert_eq!(second.close_reason(), Some(CloseReason::RoomClosed));
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_waiter_on_closed_gate_fails() {
        let hub = Arc::new(BroadcastHub::new(16));
        let guard = hub.lock_room(1).await.unwrap();

        let waiter = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.lock_room(1).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        guard.close().await;
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(RoomcastError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes_immediately() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let sub = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);
        assert_eq!(hub.subscriber_count(1).await, 1);

        hub.unsubscribe(sub);
        assert_eq!(hub.subscriber_count(1).await, 0);

        let delivered = hub
            .lock_room(1)
            .await
            .unwrap()
            .publish(Arc::new(message(1, 1)), &everyone());
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_does_not_wait_for_gate() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let sub = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);

        let guard = hub.lock_room(1).await.unwrap();
        drop(sub);
        assert_eq!(guard.gate.len(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let hub = BroadcastHub::new(16);
        let pool = idle_pool();
        let mut a = hub.lock_room(1).await.unwrap().register(&pool, 2, 0, 0);
        let mut b = hub.lock_room(2).await.unwrap().register(&pool, 2, 0, 0);

        hub.shutdown().await;

        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());
        assert_eq!(a.close_reason(), Some(CloseReason::Shutdown));
        assert_eq!(hub.room_count().await, 0);
    }

    #[test]
    fn test_close_reason_names() {
        assert_eq!(CloseReason::RoomClosed.as_str(), "room_closed");
        assert_eq!(CloseReason::Lagged.to_string(), "lagged");
        assert_eq!(CloseReason::Unavailable.as_str(), "storage_unavailable");
    }
}
