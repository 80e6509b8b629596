//! Declarative view model rendered by every interface.

use serde::Serialize;

use crate::config::{AppConfig, StatusOption};
use crate::models::{Grievance, GrievanceId, GrievanceStatus, PortalCode, StatusFilter};
use crate::session::DraftForm;
use crate::util::format_created;

/// Top-level screen to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalView {
    /// Identity bootstrap in progress
    Loading,
    /// Portal entry form
    Entry,
    Main(MainView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainView {
    pub portal_code: PortalCode,
    pub filter: StatusFilter,
    pub list: ListView,
    pub draft: DraftForm,
    pub description_chars_left: usize,
    /// Choices for each card's status selector, in display order
    pub status_options: Vec<StatusOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Loading,
    Empty,
    Items(Vec<GrievanceCard>),
}

impl ListView {
    pub fn cards(&self) -> &[GrievanceCard] {
        match self {
            Self::Items(cards) => cards,
            Self::Loading | Self::Empty => &[],
        }
    }
}

/// One rendered grievance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrievanceCard {
    pub id: GrievanceId,
    pub title: String,
    pub description: String,
    pub status: GrievanceStatus,
    pub status_label: String,
    pub status_color: String,
    pub created_label: String,
}

impl GrievanceCard {
    pub fn new(item: &Grievance, config: &AppConfig, now_ms: i64) -> Self {
        let option = config.status_option(item.status);
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            status: item.status,
            status_label: option.label,
            status_color: option.color,
            created_label: format_created(item.created_at, now_ms),
        }
    }
}
