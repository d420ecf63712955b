// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Submission event bus.
//!
//! One standing feed connection fans out to any number of subscribers.
//! Delivery works on a snapshot of the subscriber list taken outside the
//! lock, so subscribing or unsubscribing from inside a callback is safe,
//! and a subscriber removed mid-delivery receives nothing further. A
//! failing or panicking subscriber is logged and skipped; the others
//! still get the event.
//!
//! The bus remembers two things for subscribers that arrive late: the most
//! recent UPDATE record of each submission it has seen (bounded), and whether
//! the feed is currently lost. A subscription made after the loss is told
//! about it at once.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use thiserror::Error;
use tracing::{debug, info, warn};
use verdict_protocol::{
    ChannelEvent, DuplexChannel, Endpoint, EventHandler, SubmissionEvent, SubmissionId,
    SubmissionRecord, Transport,
};

/// How many submissions keep their latest UPDATE record.
const RECENT_UPDATES: usize = 64;

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Submission(SubmissionEvent),
    /// The feed connection failed or closed; no further events will arrive.
    ConnectionLost(String),
}

/// Failure reported by a subscriber callback.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("subscriber is gone")]
    Disconnected,

    #[error("{0}")]
    Failed(String),
}

type Callback = Box<dyn Fn(&BusEvent) -> Result<(), DeliveryError> + Send + Sync>;

struct Subscriber {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

impl Subscriber {
    fn deliver(&self, event: &BusEvent) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(event))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(subscriber = self.id, error = %e, "bus subscriber failed");
                false
            }
            Err(_) => {
                warn!(subscriber = self.id, "bus subscriber panicked");
                false
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Arc<Subscriber>>,
    recent: VecDeque<SubmissionRecord>,
    /// Why the feed went away, until the next `connect`
    lost: Option<String>,
}

impl Registry {
    fn remember(&mut self, record: &SubmissionRecord) {
        self.recent.retain(|r| r.id != record.id);
        self.recent.push_back(record.clone());
        if self.recent.len() > RECENT_UPDATES {
            self.recent.pop_front();
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // a poisoned registry is still a consistent list of Arcs
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone, Default)]
pub struct SubmissionBus {
    registry: Arc<Mutex<Registry>>,
}

impl SubmissionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    ///
    /// If the feed is already lost, the callback receives
    /// [`BusEvent::ConnectionLost`] before this returns.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&BusEvent) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let (subscriber, lost) = {
            let mut registry = lock(&self.registry);
            registry.next_id += 1;
            let subscriber = Arc::new(Subscriber {
                id: registry.next_id,
                active: AtomicBool::new(true),
                callback: Box::new(callback),
            });
            registry.subscribers.push(subscriber.clone());
            (subscriber, registry.lost.clone())
        };
        debug!(subscriber = subscriber.id, "bus subscriber added");

        if let Some(reason) = lost {
            debug!(subscriber = subscriber.id, "feed already lost");
            subscriber.deliver(&BusEvent::ConnectionLost(reason));
        }

        Subscription {
            subscriber,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }

    /// Latest UPDATE record seen for `id`, if it is still remembered.
    pub fn latest(&self, id: SubmissionId) -> Option<SubmissionRecord> {
        lock(&self.registry)
            .recent
            .iter()
            .rev()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Reason the feed was lost, while it stays lost.
    pub fn lost_reason(&self) -> Option<String> {
        lock(&self.registry).lost.clone()
    }

    /// Deliver `event` to every active subscriber. Returns how many accepted it.
    pub fn publish(&self, event: &BusEvent) -> usize {
        let snapshot = {
            let mut registry = lock(&self.registry);
            if let BusEvent::Submission(SubmissionEvent::Update(record)) = event {
                registry.remember(record);
            }
            registry.subscribers.clone()
        };
        deliver_all(snapshot, event)
    }

    /// Open the submissions feed on `transport` and publish what it receives.
    ///
    /// The feed stays open as long as the returned handle lives.
    pub fn connect(&self, transport: &dyn Transport) -> FeedHandle {
        lock(&self.registry).lost = None;
        let state = Arc::new(FeedState::default());
        let bus = self.clone();
        let feed = state.clone();
        let handler: EventHandler =
            Arc::new(move |event: ChannelEvent| bus.on_feed_event(&feed, event));

        FeedHandle {
            channel: transport.open(Endpoint::Submissions, handler),
            state,
        }
    }

    fn on_feed_event(&self, feed: &FeedState, event: ChannelEvent) {
        match event {
            ChannelEvent::Ready => info!("submissions feed connected"),
            ChannelEvent::Message(envelope) => match envelope.decode::<SubmissionEvent>() {
                Some(event) => {
                    debug!(submission = %event.id(), kind = %envelope.kind, "feed event");
                    self.publish(&BusEvent::Submission(event));
                }
                None => debug!(kind = %envelope.kind, "ignoring frame outside feed vocabulary"),
            },
            ChannelEvent::Error(message) => {
                warn!(error = %message, "submissions feed failed");
                self.lose(feed, message);
            }
            ChannelEvent::Closed(code) => {
                if feed.closing.load(Ordering::SeqCst) {
                    debug!("submissions feed closed");
                } else {
                    warn!(?code, "submissions feed closed by server");
                    self.lose(feed, "feed closed".to_string());
                }
            }
        }
    }

    fn lose(&self, feed: &FeedState, reason: String) {
        if feed.lost.swap(true, Ordering::SeqCst) {
            return;
        }
        // marking and snapshotting under one lock: a concurrent subscriber
        // is either in the snapshot or sees `lost`, never both
        let snapshot = {
            let mut registry = lock(&self.registry);
            registry.lost = Some(reason.clone());
            registry.subscribers.clone()
        };
        deliver_all(snapshot, &BusEvent::ConnectionLost(reason));
    }
}

fn deliver_all(snapshot: Vec<Arc<Subscriber>>, event: &BusEvent) -> usize {
    let mut delivered = 0;
    for subscriber in snapshot {
        // removed by an earlier callback of this same delivery
        if !subscriber.active.load(Ordering::SeqCst) {
            continue;
        }
        if subscriber.deliver(event) {
            delivered += 1;
        }
    }
    delivered
}

/// Disposer for one bus registration.
///
/// `unsubscribe` is idempotent and may be called from inside the
/// subscriber's own callback. Dropping the subscription unsubscribes.
pub struct Subscription {
    subscriber: Arc<Subscriber>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.subscriber.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let id = self.subscriber.id;
            lock(&registry).subscribers.retain(|s| s.id != id);
            debug!(subscriber = id, "bus subscriber removed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[derive(Default)]
struct FeedState {
    closing: AtomicBool,
    lost: AtomicBool,
}

/// Owner of the standing feed channel.
pub struct FeedHandle {
    channel: Box<dyn DuplexChannel>,
    state: Arc<FeedState>,
}

impl FeedHandle {
    pub fn close(&self) {
        self.state.closing.store(true, Ordering::SeqCst);
        self.channel.close();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.close();
    }
}
