//! Message hub - fan-out with deduplication

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use hermes_cache::RecencyCache;
use hermes_core::{Message, MessageId};

use crate::Subscription;

/// Number of most recent message ids remembered for deduplication
pub const DEFAULT_DEDUP_CAPACITY: usize = 2000;

/// Sending side of a subscriber mailbox
pub type MessageSender = mpsc::Sender<Arc<Message>>;

/// Receiving side of a subscriber mailbox
pub type MessageReceiver = mpsc::Receiver<Arc<Message>>;

/// Registration handle returned by [`Hub::subscribe`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a single publish did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The id was already seen; nothing was delivered
    Duplicate,
    /// Fan-out happened
    Delivered {
        /// Subscribers that accepted the message
        delivered: usize,
        /// Subscribers whose mailbox was full or closed
        dropped: usize,
    },
}

impl PublishOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PublishOutcome::Duplicate)
    }
}

/// Hub counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Messages accepted for fan-out (first sighting of an id)
    pub published: u64,
    /// Publishes suppressed by the dedup window
    pub duplicates: u64,
    /// Successful per-subscriber deliveries
    pub delivered: u64,
    /// Per-subscriber drops (full or closed mailbox)
    pub dropped: u64,
}

struct HubState {
    subscribers: BTreeMap<SubscriberId, MessageSender>,
    seen: RecencyCache<MessageId, ()>,
    next_subscriber: u64,
    stats: HubStats,
}

/// In-process publish/subscribe broadcaster
///
/// Every operation takes the same lock, so the order of `publish` calls is
/// the order in which subscribers see delivery attempts. The lock is never
/// held across an await point: delivery uses `try_send` only.
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    /// Create a hub with the default dedup window
    pub fn new() -> Self {
        Self::with_dedup_capacity(DEFAULT_DEDUP_CAPACITY)
    }

    /// Create a hub remembering the `capacity` most recent message ids
    pub fn with_dedup_capacity(capacity: usize) -> Self {
        Hub {
            state: Mutex::new(HubState {
                subscribers: BTreeMap::new(),
                seen: RecencyCache::new(capacity),
                next_subscriber: 0,
                stats: HubStats::default(),
            }),
        }
    }

    /// Register a mailbox for all subsequently published, unseen messages
    ///
    /// Registering two clones of the same sender yields two subscriptions.
    pub fn subscribe(&self, sender: MessageSender) -> SubscriberId {
        let mut state = self.state.lock();
        state.next_subscriber += 1;
        let id = SubscriberId(state.next_subscriber);
        state.subscribers.insert(id, sender);
        tracing::debug!(subscriber = %id, "subscribed");
        id
    }

    /// Create a bounded mailbox, register it and return a guard owning the
    /// receiver. Dropping the guard unsubscribes.
    pub fn subscribe_channel(self: &Arc<Self>, buffer: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.subscribe(tx);
        Subscription::new(id, rx, Arc::clone(self))
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.state.lock().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "unsubscribed");
        }
        removed
    }

    /// Fan a message out to every registered subscriber
    ///
    /// Already-seen ids are ignored. A subscriber whose mailbox is full
    /// misses the message; the publisher is never blocked.
    pub fn publish(&self, msg: Arc<Message>) -> PublishOutcome {
        let mut state = self.state.lock();

        if state.seen.get(&msg.id).is_some() {
            state.stats.duplicates += 1;
            return PublishOutcome::Duplicate;
        }
        state.seen.set(msg.id.clone(), ());
        state.stats.published += 1;

        let mut delivered = 0;
        let mut dropped = 0;
        for (id, sender) in &state.subscribers {
            match sender.try_send(Arc::clone(&msg)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::warn!(subscriber = %id, message_id = %msg.id, "ignoring slow subscriber");
                }
                Err(TrySendError::Closed(_)) => {
                    dropped += 1;
                    tracing::debug!(subscriber = %id, message_id = %msg.id, "subscriber mailbox closed");
                }
            }
        }

        state.stats.delivered += delivered as u64;
        state.stats.dropped += dropped as u64;
        PublishOutcome::Delivered { delivered, dropped }
    }

    /// Whether a message id is inside the dedup window
    pub fn has_seen(&self, id: &MessageId) -> bool {
        self.state.lock().seen.contains(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn stats(&self) -> HubStats {
        self.state.lock().stats.clone()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Hub")
            .field("subscribers", &state.subscribers.len())
            .field("seen", &state.seen.len())
            .field("stats", &state.stats)
            .finish()
    }
}
