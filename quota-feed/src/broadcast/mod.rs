//! Push fan-out to an unbounded set of live subscribers.
//!
//! Each subscriber owns a bounded channel registered in the [`Broadcaster`]. A new subscriber is
//! sent a bootstrap snapshot of the [`SharedCache`] before it becomes visible to
//! [`Broadcaster::publish`], so it never observes a live update ahead of its bootstrap. A
//! subscriber whose channel is closed or full is pruned the moment a send to it fails.

use crate::{cache::SharedCache, timeframe::TimeframeSelector};
use derive_more::{Display, From};
use fnv::FnvHashMap;
use futures::Stream;
use parking_lot::Mutex;
use std::{
    pin::Pin,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};
use tracing::{debug, info, trace};

/// [`FeedEvent`] and [`PushMessage`] pushed down subscriber channels.
pub mod event;

pub use event::{FeedEvent, PushMessage};

/// Default per-subscriber keep-alive period.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Default per-subscriber channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Unique identifier of one push connection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From)]
pub struct SubscriberId(pub u64);

/// Which cached candle sets a new subscriber receives in its bootstrap snapshot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum BootstrapScope {
    ActiveTimeframe,
    #[default]
    AllTimeframes,
}

#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    pub channel_capacity: usize,
    pub keep_alive_interval: Duration,
    pub bootstrap: BootstrapScope,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            bootstrap: BootstrapScope::default(),
        }
    }
}

/// Registry of live subscribers.
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: Mutex<FnvHashMap<SubscriberId, mpsc::Sender<PushMessage>>>,
    next_id: AtomicU64,
    cache: Arc<SharedCache>,
    selector: Arc<TimeframeSelector>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(
        cache: Arc<SharedCache>,
        selector: Arc<TimeframeSelector>,
        config: BroadcastConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(FnvHashMap::default()),
            next_id: AtomicU64::new(1),
            cache,
            selector,
            config,
        })
    }

    /// Register a new subscriber and enqueue its bootstrap snapshot.
    ///
    /// Must be called from within a Tokio runtime: each subscriber gets its own keep-alive task.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Hold the registry lock from the cache read until insertion, so any write the
        // snapshot misses is published to this subscriber once it is registered
        let mut subscribers = self.subscribers.lock();

        let bootstrap = self.bootstrap_events();
        let capacity = self.config.channel_capacity.max(bootstrap.len() + 1);
        let (tx, rx) = mpsc::channel(capacity);

        let bootstrap_len = bootstrap.len();
        for event in bootstrap {
            // Capacity exceeds the snapshot length, cannot fail
            let _ = tx.try_send(PushMessage::Event(event));
        }

        subscribers.insert(id, tx.clone());
        let total = subscribers.len();
        drop(subscribers);

        info!(%id, bootstrap = bootstrap_len, subscribers = total, "subscriber connected");
        self.spawn_keep_alive(id, tx);

        Subscription {
            id,
            rx,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Send `event` to every registered subscriber, pruning any whose send fails.
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, event: FeedEvent) -> usize {
        let snapshot = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect::<Vec<_>>();

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, tx) in snapshot {
            match tx.try_send(PushMessage::Event(event.clone())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(%id, "subscriber channel full, pruning slow subscriber");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => failed.push(id),
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in &failed {
                subscribers.remove(id);
            }
        }

        debug!(
            kind = event.kind(),
            interval = ?event.interval(),
            delivered,
            pruned = failed.len(),
            "published feed event"
        );

        delivered
    }

    /// Remove a subscriber, returning whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            info!(%id, subscribers = self.subscriber_count(), "subscriber disconnected");
        }
        removed
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Current cached values in the order a new subscriber receives them.
    pub fn bootstrap_events(&self) -> Vec<FeedEvent> {
        let mut events = Vec::new();

        if let Some(price) = self.cache.price() {
            events.push(FeedEvent::from(price.as_ref()));
        }
        if let Some(quote) = self.cache.quote() {
            events.push(FeedEvent::from(quote.as_ref()));
        }

        match self.config.bootstrap {
            BootstrapScope::ActiveTimeframe => {
                if let Some(candles) = self.cache.candles(self.selector.active()) {
                    events.push(FeedEvent::from(candles.as_ref()));
                }
            }
            BootstrapScope::AllTimeframes => events.extend(
                self.cache
                    .all_candles()
                    .iter()
                    .map(|candles| FeedEvent::from(candles.as_ref())),
            ),
        }

        events
    }

    fn spawn_keep_alive(self: &Arc<Self>, id: SubscriberId, tx: mpsc::Sender<PushMessage>) {
        let broadcaster = Arc::downgrade(self);
        let period = self.config.keep_alive_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {
                        let Some(broadcaster) = broadcaster.upgrade() else {
                            break;
                        };
                        if !broadcaster.is_subscribed(id) {
                            break;
                        }
                        if tx.try_send(PushMessage::KeepAlive).is_err() {
                            debug!(%id, "keep-alive failed, pruning subscriber");
                            break;
                        }
                    }
                }
            }

            if let Some(broadcaster) = broadcaster.upgrade() {
                broadcaster.unsubscribe(id);
            }
            trace!(%id, "keep-alive task finished");
        });
    }
}

/// Receiving half of one push connection.
///
/// Yields the bootstrap snapshot, then live updates and keep-alives. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<PushMessage>,
    broadcaster: Weak<Broadcaster>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<PushMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PushMessage> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = PushMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}
