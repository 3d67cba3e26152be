//! Change notifications.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{trace, warn};

/// Event topics a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Fired once after every committed write.
    Update,
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            other => Err(format!("unknown event topic: {other}")),
        }
    }
}

/// Payload delivered to `Update` handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEvent {
    /// Change count right after the commit that fired this event.
    pub change_count: u64,
}

pub type Handler = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Identity of one registration, returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

/// Fan-out registry of event handlers.
///
/// Handlers run on the store actor right after a commit, outside the hub
/// lock. They must not block; a handler that needs to do real work should
/// hand the event to a channel. A handler that panics is logged and skipped
/// for that event.
#[derive(Default)]
pub struct EventHub {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, topic, handler });
        trace!(?topic, id = id.0, "subscribed");
        id
    }

    /// Remove one registration, or every registration for `topic` when
    /// `id` is `None`. Returns the number removed.
    pub fn unsubscribe(&self, topic: Topic, id: Option<SubscriptionId>) -> usize {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.topic != topic || id.is_some_and(|id| s.id != id));
        before - subs.len()
    }

    pub fn publish(&self, topic: Topic, event: &UpdateEvent) {
        let handlers: Vec<Handler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler))
            .collect();
        trace!(?topic, handlers = handlers.len(), change_count = event.change_count, "publish");
        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(?topic, change_count = event.change_count, "event handler panicked");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
