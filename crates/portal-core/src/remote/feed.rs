//! Live feed channel shared by every backend.
//!
//! A feed is an unbounded stream of full snapshots. Cancellation is
//! synchronous: once [`Subscription::cancel`] returns, no further event is
//! yielded, including events that were already queued.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::RemoteFault;
use crate::models::{Grievance, PortalCode};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One delivery from a live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The complete current item set, newest first
    Snapshot(Vec<Grievance>),
    /// The feed failed and will deliver nothing further
    Failed(RemoteFault),
}

/// Producer half held by a backend.
#[derive(Debug, Clone)]
pub struct FeedSender {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<FeedEvent>,
    cancelled: Arc<AtomicBool>,
}

impl FeedSender {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Queue an event; returns `false` once the subscriber is gone.
    pub fn send(&self, event: FeedEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    /// Resolves when the subscriber cancels or drops its subscription.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Cloneable cancellation handle for a [`Subscription`].
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Consumer half: an async stream of feed events for one portal.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    portal: PortalCode,
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    pub const fn portal(&self) -> &PortalCode {
        &self.portal
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id,
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for the next event. `None` once cancelled or when the backend
    /// has closed the feed.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        if self.is_cancelled() {
            return None;
        }
        let event = self.rx.recv().await?;
        if self.is_cancelled() {
            return None;
        }
        Some(event)
    }

    /// Non-blocking variant of [`Self::next`].
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        if self.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop the feed. No event is yielded after this returns.
    pub fn cancel(&mut self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Cancelled subscription {} for portal {}", self.id, self.portal);
        }
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Create a connected sender/subscription pair for `portal`.
pub fn feed_channel(portal: PortalCode) -> (FeedSender, Subscription) {
    let id = SubscriptionId::next();
    let (tx, rx) = mpsc::unbounded_channel();
    let cancelled = Arc::new(AtomicBool::new(false));

    let sender = FeedSender {
        id,
        tx,
        cancelled: Arc::clone(&cancelled),
    };
    let subscription = Subscription {
        id,
        portal,
        rx,
        cancelled,
    };
    (sender, subscription)
}
