use std::sync::Arc;

use futures_util::Stream;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use hearth_types::events::{ChangeEvent, SubscriptionFilter};

pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Fans committed document changes out to every live query.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscription holds a receiver on this channel and filters locally
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Open a live query. Events published before this call are not replayed.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let id = Uuid::new_v4();
        debug!("Subscription {} opened for {:?}", id, filter);
        Subscription {
            id,
            filter,
            rx: self.inner.broadcast_tx.subscribe(),
        }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered view of the change feed. Dropping it (or calling
/// [`Subscription::unsubscribe`]) detaches it from the dispatcher.
pub struct Subscription {
    id: Uuid,
    filter: SubscriptionFilter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filter(&self) -> SubscriptionFilter {
        self.filter
    }

    /// Wait for the next matching event. Returns `None` once the dispatcher
    /// is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Subscription {} lagged by {} events", self.id, n);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event that is already buffered, without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => {
                    warn!("Subscription {} lagged by {} events", self.id, n);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> {
        let mut sub = self;
        async_stream::stream! {
            while let Some(event) = sub.next().await {
                yield event;
            }
        }
    }

    pub fn unsubscribe(self) {
        debug!("Subscription {} closed", self.id);
    }
}
