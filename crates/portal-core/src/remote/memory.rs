//! In-process document store with live fan-out.
//!
//! `MemoryBackend` plays the role of the hosted database for tests and
//! offline sessions: every clone shares the same documents, and each write
//! synchronously pushes a fresh snapshot to every live subscription of the
//! affected portal. Faults can be injected to exercise error handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{feed_channel, FeedEvent, FeedSender, Identity, RemoteCollection, Subscription};
use crate::error::{Error, RemoteFault, Result};
use crate::models::{Grievance, GrievanceId, GrievanceStatus, NewGrievance, PortalCode};
use crate::util::unix_millis_now;

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<PortalCode, Vec<Grievance>>,
    listeners: HashMap<PortalCode, Vec<FeedSender>>,
    clock: i64,
    reject_identity: bool,
    permission_denied: bool,
    offline: bool,
}

impl MemoryState {
    /// Server clock: wall time, but strictly increasing per write.
    fn tick(&mut self) -> i64 {
        self.clock = (self.clock + 1).max(unix_millis_now());
        self.clock
    }

    fn snapshot(&self, portal: &PortalCode) -> Vec<Grievance> {
        let mut items = self.documents.get(portal).cloned().unwrap_or_default();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    fn check_access(&self) -> std::result::Result<(), RemoteFault> {
        if self.offline {
            return Err(RemoteFault::Connection("backend unreachable".to_string()));
        }
        if self.permission_denied {
            return Err(RemoteFault::PermissionDenied(
                "missing or insufficient permissions".to_string(),
            ));
        }
        Ok(())
    }

    fn publish(&mut self, portal: &PortalCode) {
        let snapshot = self.snapshot(portal);
        if let Some(listeners) = self.listeners.get_mut(portal) {
            listeners.retain(|listener| listener.send(FeedEvent::Snapshot(snapshot.clone())));
            tracing::debug!(
                "Published {} grievances to {} listeners on portal {}",
                snapshot.len(),
                listeners.len(),
                portal
            );
        }
    }
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    identities: Arc<AtomicU64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh client with its own (not yet established) identity.
    pub fn client(&self) -> MemoryClient {
        MemoryClient {
            backend: self.clone(),
            identity: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current ordered contents of a portal.
    pub fn snapshot(&self, portal: &PortalCode) -> Vec<Grievance> {
        self.lock().snapshot(portal)
    }

    /// Number of subscriptions on `portal` that are still receiving.
    pub fn live_subscription_count(&self, portal: &PortalCode) -> usize {
        let mut state = self.lock();
        state.listeners.get_mut(portal).map_or(0, |listeners| {
            listeners.retain(|listener| !listener.is_cancelled());
            listeners.len()
        })
    }

    /// Make identity bootstrap fail.
    pub fn set_reject_identity(&self, reject: bool) {
        self.lock().reject_identity = reject;
    }

    /// Make subscribe and mutations fail with `PermissionDenied`.
    pub fn set_permission_denied(&self, denied: bool) {
        self.lock().permission_denied = denied;
    }

    /// Make subscribe and mutations fail with `Connection`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Terminate every live feed with `fault`, as a backend does when rules
    /// change or the connection drops under an open listener.
    pub fn fail_live_feeds(&self, fault: &RemoteFault) {
        let mut state = self.lock();
        for (portal, listeners) in state.listeners.drain() {
            tracing::warn!("Failing {} live feeds on portal {}", listeners.len(), portal);
            for listener in listeners {
                listener.send(FeedEvent::Failed(fault.clone()));
            }
        }
    }
}

/// One caller's connection to a [`MemoryBackend`].
#[derive(Debug, Clone)]
pub struct MemoryClient {
    backend: MemoryBackend,
    identity: Arc<Mutex<Option<Identity>>>,
}

impl MemoryClient {
    pub const fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    fn require_identity(&self) -> Result<()> {
        let identity = self.identity.lock().unwrap_or_else(PoisonError::into_inner);
        if identity.is_some() {
            Ok(())
        } else {
            Err(Error::Auth("anonymous identity not established".to_string()))
        }
    }
}

impl RemoteCollection for MemoryClient {
    async fn bootstrap_identity(&self) -> Result<Identity> {
        if self.backend.lock().reject_identity {
            return Err(Error::Auth("anonymous sign-in is disabled".to_string()));
        }

        let number = self.backend.identities.fetch_add(1, Ordering::Relaxed) + 1;
        let identity = Identity {
            uid: format!("anon-{number}"),
        };
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(identity)
    }

    async fn subscribe(&self, portal: &PortalCode) -> Result<Subscription> {
        self.require_identity()?;
        let mut state = self.backend.lock();
        state.check_access()?;

        let (sender, subscription) = feed_channel(portal.clone());
        sender.send(FeedEvent::Snapshot(state.snapshot(portal)));
        let listeners = state.listeners.entry(portal.clone()).or_default();
        listeners.retain(|listener| !listener.is_cancelled());
        listeners.push(sender);
        Ok(subscription)
    }

    async fn create_item(&self, portal: &PortalCode, item: NewGrievance) -> Result<GrievanceId> {
        self.require_identity()?;
        let mut state = self.backend.lock();
        state.check_access().map_err(Error::Write)?;

        let now = state.tick();
        let grievance = Grievance {
            id: GrievanceId::generate(),
            title: item.title,
            description: item.description,
            status: GrievanceStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let id = grievance.id.clone();
        state
            .documents
            .entry(portal.clone())
            .or_default()
            .push(grievance);
        state.publish(portal);
        Ok(id)
    }

    async fn update_status(
        &self,
        portal: &PortalCode,
        id: &GrievanceId,
        status: GrievanceStatus,
    ) -> Result<()> {
        self.require_identity()?;
        let mut state = self.backend.lock();
        state.check_access().map_err(Error::Write)?;

        let now = state.tick();
        let grievance = state
            .documents
            .get_mut(portal)
            .and_then(|items| items.iter_mut().find(|item| &item.id == id))
            .ok_or_else(|| {
                Error::Write(RemoteFault::Connection(format!("no document to update: {id}")))
            })?;
        grievance.status = status;
        grievance.updated_at = now;
        state.publish(portal);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn portal(code: &str) -> PortalCode {
        PortalCode::parse(code, 6).unwrap()
    }

    async fn signed_in(backend: &MemoryBackend) -> MemoryClient {
        let client = backend.client();
        client.bootstrap_identity().await.unwrap();
        client
    }

    fn expect_snapshot(event: Option<FeedEvent>) -> Vec<Grievance> {
        match event {
            Some(FeedEvent::Snapshot(items)) => items,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn operations_require_identity() {
        let backend = MemoryBackend::new();
        let client = backend.client();
        let error = client.subscribe(&portal("AAAAAA")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn rejected_identity_is_auth_failure() {
        let backend = MemoryBackend::new();
        backend.set_reject_identity(true);
        let error = backend.client().bootstrap_identity().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_snapshot_then_every_change() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let code = portal("ABC123");

        let mut feed = client.subscribe(&code).await.unwrap();
        assert!(expect_snapshot(feed.next().await).is_empty());

        let first = client
            .create_item(&code, NewGrievance::new("Dishes", "Left in the sink"))
            .await
            .unwrap();
        let items = expect_snapshot(feed.next().await);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, GrievanceStatus::Pending);

        client
            .create_item(&code, NewGrievance::new("Late", "Twenty minutes"))
            .await
            .unwrap();
        let items = expect_snapshot(feed.next().await);
        assert_eq!(items[0].title, "Late");
        assert_eq!(items[1].id, first);
        assert!(items[0].created_at > items[1].created_at);

        client
            .update_status(&code, &first, GrievanceStatus::Resolved)
            .await
            .unwrap();
        let items = expect_snapshot(feed.next().await);
        let updated = items.iter().find(|item| item.id == first).unwrap();
        assert_eq!(updated.status, GrievanceStatus::Resolved);
        assert!(updated.updated_at > updated.created_at);
    }

    #[tokio::test]
    async fn portals_are_isolated() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let mut other_feed = client.subscribe(&portal("OTHER1")).await.unwrap();
        expect_snapshot(other_feed.next().await);

        client
            .create_item(&portal("ABC123"), NewGrievance::new("t", "d"))
            .await
            .unwrap();

        assert_eq!(other_feed.try_next(), None);
        assert!(backend.snapshot(&portal("OTHER1")).is_empty());
    }

    #[tokio::test]
    async fn cancelled_feeds_are_pruned() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let code = portal("ABC123");

        let mut feed = client.subscribe(&code).await.unwrap();
        assert_eq!(backend.live_subscription_count(&code), 1);
        feed.cancel();
        assert_eq!(backend.live_subscription_count(&code), 0);
    }

    #[tokio::test]
    async fn resubscribing_drops_cancelled_listeners() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let code = portal("ABC123");

        for _ in 0..5 {
            let mut feed = client.subscribe(&code).await.unwrap();
            feed.cancel();
        }
        let _live = client.subscribe(&code).await.unwrap();

        assert_eq!(backend.lock().listeners[&code].len(), 1);
    }

    #[tokio::test]
    async fn faults_map_to_classified_errors() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let code = portal("ABC123");

        backend.set_permission_denied(true);
        assert_eq!(
            client.subscribe(&code).await.unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            client
                .create_item(&code, NewGrievance::new("t", "d"))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::WriteFailure
        );

        backend.set_permission_denied(false);
        backend.set_offline(true);
        assert_eq!(
            client.subscribe(&code).await.unwrap_err().kind(),
            ErrorKind::ConnectionError
        );
    }

    #[tokio::test]
    async fn live_feed_failure_is_delivered_in_stream() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let code = portal("ABC123");
        let mut feed = client.subscribe(&code).await.unwrap();
        expect_snapshot(feed.next().await);

        backend.fail_live_feeds(&RemoteFault::PermissionDenied("rules".to_string()));

        assert!(matches!(
            feed.next().await,
            Some(FeedEvent::Failed(RemoteFault::PermissionDenied(_)))
        ));
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn updating_unknown_item_is_write_failure() {
        let backend = MemoryBackend::new();
        let client = signed_in(&backend).await;
        let error = client
            .update_status(
                &portal("ABC123"),
                &GrievanceId::from("missing"),
                GrievanceStatus::Resolved,
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WriteFailure);
    }
}
