//! Portal session: view state and user actions over one live feed.
//!
//! A `PortalSession` owns the remote client, the preference store and the
//! single live subscription of the active portal. Feed deliveries replace the
//! known item set wholesale; the visible list is always re-derived from the
//! latest snapshot and the active filter. Mutations never touch local state
//! directly, the feed re-delivers the result.

mod notify;

pub use notify::{Notification, NotificationLevel};

use crate::config::AppConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{
    filter_grievances, Grievance, GrievanceId, GrievanceStatus, NewGrievance, PortalCode,
    StatusFilter,
};
use crate::prefs::{PreferenceStore, PORTAL_ID_KEY};
use crate::remote::{FeedEvent, Identity, RemoteCollection, Subscription, SubscriptionId};
use crate::view::{GrievanceCard, ListView, MainView, PortalView};

pub const SWITCH_PORTAL_PROMPT: &str =
    "Switch to a different portal? This will clear your current portal.";

/// Which screen the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Identity not yet established
    #[default]
    Uninitialized,
    /// Waiting for the user to enter or create a portal
    EntryPending,
    /// Inside a portal with a live feed
    Active,
}

/// The filtered list derived from the latest snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleItems {
    /// No snapshot delivered yet
    Loading,
    /// Snapshot delivered, nothing matches the filter
    Empty,
    Items(Vec<Grievance>),
}

/// Submission form contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftForm {
    pub title: String,
    pub description: String,
}

/// One event read from the session's live feed, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDelivery {
    pub subscription: SubscriptionId,
    /// `None` when the backend closed the feed
    pub event: Option<FeedEvent>,
}

pub struct PortalSession<R, P> {
    remote: R,
    prefs: P,
    config: AppConfig,
    identity: Option<Identity>,
    screen: Screen,
    portal: Option<PortalCode>,
    filter: StatusFilter,
    subscription: Option<Subscription>,
    snapshot: Option<Vec<Grievance>>,
    draft: DraftForm,
    notifications: Vec<Notification>,
}

impl<R: RemoteCollection, P: PreferenceStore> PortalSession<R, P> {
    pub fn new(remote: R, prefs: P, config: AppConfig) -> Self {
        Self {
            remote,
            prefs,
            config,
            identity: None,
            screen: Screen::Uninitialized,
            portal: None,
            filter: StatusFilter::All,
            subscription: None,
            snapshot: None,
            draft: DraftForm::default(),
            notifications: Vec::new(),
        }
    }

    pub const fn screen(&self) -> Screen {
        self.screen
    }

    pub const fn portal(&self) -> Option<&PortalCode> {
        self.portal.as_ref()
    }

    pub const fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn prefs(&self) -> &P {
        &self.prefs
    }

    pub const fn draft(&self) -> &DraftForm {
        &self.draft
    }

    /// Latest full snapshot from the feed, newest first.
    pub fn snapshot(&self) -> Option<&[Grievance]> {
        self.snapshot.as_deref()
    }

    /// Id of the live subscription, if one is open.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription
            .as_ref()
            .filter(|subscription| !subscription.is_cancelled())
            .map(Subscription::id)
    }

    pub fn has_live_subscription(&self) -> bool {
        self.subscription_id().is_some()
    }

    /// Establish identity, then re-enter the saved portal if there is one.
    ///
    /// Only an identity failure is returned. A saved portal that cannot be
    /// re-entered leaves the session on the entry screen with the failure
    /// queued as a notification.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.remote.bootstrap_identity().await {
            Ok(identity) => {
                tracing::info!("Signed in anonymously: {}", identity.uid);
                self.identity = Some(identity);
            }
            Err(error) => {
                tracing::error!("Error initializing session: {}", error);
                self.notify(
                    NotificationLevel::Error,
                    "Failed to initialize the app. Please refresh and try again.",
                );
                return Err(error);
            }
        }

        if let Some(code) = self.saved_portal() {
            tracing::info!("Found saved portal ID, entering portal {}", code);
            match self.enter_portal(code).await {
                Err(error) if error.kind() == ErrorKind::AuthFailure => Err(error),
                Err(error) => {
                    tracing::warn!("Saved portal could not be re-entered: {}", error);
                    Ok(())
                }
                Ok(()) => Ok(()),
            }
        } else {
            tracing::info!("No saved portal ID, showing portal entry");
            self.screen = Screen::EntryPending;
            Ok(())
        }
    }

    /// Pick the portal to enter: the saved code, else the user's candidate,
    /// else a freshly generated code.
    pub fn resolve_portal(&mut self, candidate: Option<&str>) -> Result<PortalCode> {
        if let Some(code) = self.saved_portal() {
            return Ok(code);
        }

        match candidate {
            Some(candidate) => PortalCode::parse(candidate, self.config.portal_id_length)
                .map_err(|error| self.reject(error)),
            None => Ok(PortalCode::generate(self.config.portal_id_length)),
        }
    }

    /// Persist `code`, tear down any previous feed and open a new one.
    pub async fn enter_portal(&mut self, code: PortalCode) -> Result<()> {
        if !self.prefs.set(PORTAL_ID_KEY, code.as_str()) {
            tracing::debug!("Portal {} not persisted; it will be asked for again", code);
        }

        self.cancel_subscription();
        self.snapshot = None;
        self.portal = Some(code.clone());

        match self.remote.subscribe(&code).await {
            Ok(subscription) => {
                tracing::info!(
                    "Entered portal {} with subscription {}",
                    code,
                    subscription.id()
                );
                self.subscription = Some(subscription);
                self.screen = Screen::Active;
                self.notify(NotificationLevel::Success, "Welcome to your portal!");
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Error entering portal {}: {}", code, error);
                self.screen = Screen::EntryPending;
                self.notify(
                    NotificationLevel::Error,
                    format!("Failed to enter portal. Please try again. {error}"),
                );
                Err(error)
            }
        }
    }

    /// Wait for the next delivery on the live feed.
    ///
    /// Never resolves while no subscription is open, so it can sit in a
    /// `select!` next to user input.
    pub async fn next_feed_event(&mut self) -> FeedDelivery {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        let id = subscription.id();
        FeedDelivery {
            subscription: id,
            event: subscription.next().await,
        }
    }

    /// Apply a delivery. Returns `false` when it came from a subscription
    /// that has since been cancelled or replaced.
    pub fn apply_feed_event(&mut self, delivery: FeedDelivery) -> bool {
        let is_current = self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.id() == delivery.subscription);
        if !is_current {
            tracing::debug!("Ignoring delivery from stale {}", delivery.subscription);
            return false;
        }

        match delivery.event {
            Some(FeedEvent::Snapshot(items)) => {
                self.on_feed_update(items);
            }
            Some(FeedEvent::Failed(fault)) => {
                tracing::warn!("Live feed failed: {}", fault);
                self.cancel_subscription();
                self.notify(NotificationLevel::Error, fault.to_string());
            }
            None => {
                tracing::warn!("Live feed closed by backend");
                self.cancel_subscription();
                self.notify(
                    NotificationLevel::Error,
                    "Lost connection to the portal. Re-enter the portal to reconnect.",
                );
            }
        }
        true
    }

    /// Await and apply one delivery.
    pub async fn pump(&mut self) -> bool {
        let delivery = self.next_feed_event().await;
        self.apply_feed_event(delivery)
    }

    /// Replace the known item set and re-derive the visible list.
    pub fn on_feed_update(&mut self, items: Vec<Grievance>) -> VisibleItems {
        tracing::debug!("Feed delivered {} grievances", items.len());
        self.snapshot = Some(items);
        self.visible()
    }

    /// The list to render for the current snapshot and filter.
    pub fn visible(&self) -> VisibleItems {
        let Some(items) = self.snapshot.as_deref() else {
            return VisibleItems::Loading;
        };
        let filtered = filter_grievances(items, self.filter);
        if filtered.is_empty() {
            VisibleItems::Empty
        } else {
            VisibleItems::Items(filtered)
        }
    }

    /// Change the filter and re-derive from the cached snapshot.
    pub fn set_filter(&mut self, filter: StatusFilter) -> VisibleItems {
        self.filter = filter;
        self.visible()
    }

    pub fn set_draft(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.draft = DraftForm {
            title: title.into(),
            description: description.into(),
        };
    }

    /// Fill the form and submit it.
    pub async fn submit_item(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<GrievanceId> {
        self.set_draft(title, description);
        self.submit_draft().await
    }

    /// Validate and submit the current form. The form is cleared only when
    /// the backend accepts the item.
    pub async fn submit_draft(&mut self) -> Result<GrievanceId> {
        let portal = self.require_portal()?;
        let title = self.draft.title.trim().to_string();
        let description = self.draft.description.trim().to_string();

        if title.is_empty() || description.is_empty() {
            return Err(self.reject(Error::validation(
                "Please fill in both title and description.",
            )));
        }
        let max = self.config.max_grievance_length;
        if description.chars().count() > max {
            return Err(self.reject(Error::validation(format!(
                "Description must be at most {max} characters."
            ))));
        }

        match self
            .remote
            .create_item(&portal, NewGrievance::new(title, description))
            .await
        {
            Ok(id) => {
                self.draft = DraftForm::default();
                self.notify(NotificationLevel::Success, "Grievance added!");
                Ok(id)
            }
            Err(error) => {
                tracing::error!("Error adding grievance: {}", error);
                self.notify(NotificationLevel::Error, error.to_string());
                Err(error)
            }
        }
    }

    /// Ask the backend to change a status; the feed delivers the result.
    pub async fn change_item_status(
        &mut self,
        id: &GrievanceId,
        status: GrievanceStatus,
    ) -> Result<()> {
        let portal = self.require_portal()?;
        match self.remote.update_status(&portal, id, status).await {
            Ok(()) => {
                self.notify(NotificationLevel::Success, "Status updated successfully!");
                Ok(())
            }
            Err(error) => {
                tracing::error!("Error updating status of {}: {}", id, error);
                self.notify(NotificationLevel::Error, error.to_string());
                Err(error)
            }
        }
    }

    /// Leave the portal after explicit confirmation. Returns whether the
    /// switch happened.
    pub fn switch_portal(&mut self, confirm: impl FnOnce(&str) -> bool) -> bool {
        if !confirm(SWITCH_PORTAL_PROMPT) {
            return false;
        }

        self.forget_saved_portal();
        self.cancel_subscription();
        if let Some(portal) = self.portal.take() {
            tracing::info!("Left portal {}", portal);
        }
        self.snapshot = None;
        self.screen = Screen::EntryPending;
        true
    }

    /// Drain queued notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Declarative view of the current state.
    pub fn view(&self, now_ms: i64) -> PortalView {
        match self.screen {
            Screen::Uninitialized => PortalView::Loading,
            Screen::EntryPending => PortalView::Entry,
            Screen::Active => {
                let Some(portal) = self.portal.clone() else {
                    return PortalView::Entry;
                };
                let list = match self.visible() {
                    VisibleItems::Loading => ListView::Loading,
                    VisibleItems::Empty => ListView::Empty,
                    VisibleItems::Items(items) => ListView::Items(
                        items
                            .iter()
                            .map(|item| GrievanceCard::new(item, &self.config, now_ms))
                            .collect(),
                    ),
                };
                let used = self.draft.description.trim().chars().count();
                PortalView::Main(MainView {
                    portal_code: portal,
                    filter: self.filter,
                    list,
                    draft: self.draft.clone(),
                    description_chars_left: self.config.max_grievance_length.saturating_sub(used),
                    status_options: self.config.status_options.clone(),
                })
            }
        }
    }

    /// Drop the saved portal code without touching the live feed.
    pub fn forget_saved_portal(&mut self) {
        if !self.prefs.remove(PORTAL_ID_KEY) {
            tracing::debug!("Saved portal ID could not be cleared");
        }
    }

    /// The portal code kept from an earlier run, if it is still valid.
    pub fn saved_portal(&self) -> Option<PortalCode> {
        let stored = self.prefs.get(PORTAL_ID_KEY)?;
        match PortalCode::parse(&stored, self.config.portal_id_length) {
            Ok(code) => Some(code),
            Err(error) => {
                tracing::warn!("Ignoring saved portal ID '{}': {}", stored, error);
                None
            }
        }
    }

    fn require_portal(&mut self) -> Result<PortalCode> {
        if self.screen == Screen::Active {
            if let Some(portal) = &self.portal {
                return Ok(portal.clone());
            }
        }
        Err(self.reject(Error::validation("Enter a portal first.")))
    }

    fn cancel_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Surface a validation failure to the user and hand it back.
    fn reject(&mut self, error: Error) -> Error {
        self.notify(NotificationLevel::Warning, error.to_string());
        error
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
    }
}
