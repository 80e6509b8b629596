//! Client-local status filter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Grievance, GrievanceStatus};

/// Which grievances the list shows. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    InProgress,
    Resolved,
}

impl StatusFilter {
    pub const ALL: [Self; 4] = [Self::All, Self::Pending, Self::InProgress, Self::Resolved];

    /// The status this filter selects, or `None` for `All`.
    #[must_use]
    pub const fn status(self) -> Option<GrievanceStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(GrievanceStatus::Pending),
            Self::InProgress => Some(GrievanceStatus::InProgress),
            Self::Resolved => Some(GrievanceStatus::Resolved),
        }
    }

    #[must_use]
    pub fn matches(self, grievance: &Grievance) -> bool {
        self.status().is_none_or(|status| grievance.status == status)
    }
}

impl From<GrievanceStatus> for StatusFilter {
    fn from(status: GrievanceStatus) -> Self {
        match status {
            GrievanceStatus::Pending => Self::Pending,
            GrievanceStatus::InProgress => Self::InProgress,
            GrievanceStatus::Resolved => Self::Resolved,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(f, "{status}"),
            None => f.write_str("all"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<GrievanceStatus>().map(Self::from).map_err(|_| {
            format!(
                "unknown filter '{}' (expected all, pending, in-progress or resolved)",
                s.trim()
            )
        })
    }
}

/// Keep the grievances matching `filter`, preserving input order.
#[must_use]
pub fn filter_grievances(grievances: &[Grievance], filter: StatusFilter) -> Vec<Grievance> {
    grievances
        .iter()
        .filter(|grievance| filter.matches(grievance))
        .cloned()
        .collect()
}
