//! Remote collection client: anonymous identity, live grievance feeds and
//! create/update mutations against a shared document store.

mod feed;
mod firestore;
mod memory;

pub use feed::{
    feed_channel, FeedEvent, FeedSender, Subscription, SubscriptionHandle, SubscriptionId,
};
pub use firestore::FirestoreClient;
pub use memory::{MemoryBackend, MemoryClient};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{GrievanceId, GrievanceStatus, NewGrievance, PortalCode};

/// Anonymous caller identity issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
}

/// Access to the shared `portals/{code}/grievances` collection.
///
/// `bootstrap_identity` must succeed before any other call; the others fail
/// with [`crate::Error::Auth`] until it has.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection {
    /// Establish an anonymous caller identity
    async fn bootstrap_identity(&self) -> Result<Identity>;

    /// Open a live feed of every grievance under `portal`, newest first.
    ///
    /// Each backend change re-delivers the full ordered set. Failures after
    /// open arrive as [`FeedEvent::Failed`] and end the feed.
    async fn subscribe(&self, portal: &PortalCode) -> Result<Subscription>;

    /// Insert a grievance with status `pending` and server timestamps
    async fn create_item(&self, portal: &PortalCode, item: NewGrievance) -> Result<GrievanceId>;

    /// Set the status of a grievance and refresh its update timestamp
    async fn update_status(
        &self,
        portal: &PortalCode,
        id: &GrievanceId,
        status: GrievanceStatus,
    ) -> Result<()>;
}
