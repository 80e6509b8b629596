//! Grievance model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned identifier, unique within a portal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrievanceId(String);

impl GrievanceId {
    /// Create a new time-sortable identifier (UUID v7)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrievanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GrievanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for GrievanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a grievance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrievanceStatus {
    Pending,
    InProgress,
    Resolved,
}

impl GrievanceStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Resolved];

    /// Wire value, as stored in the document database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for GrievanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" | "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!(
                "unknown status '{other}' (expected pending, in-progress or resolved)"
            )),
        }
    }
}

/// A grievance as delivered by the live feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grievance {
    pub id: GrievanceId,
    pub title: String,
    pub description: String,
    pub status: GrievanceStatus,
    /// Server-assigned creation timestamp (Unix ms)
    pub created_at: i64,
    /// Server-assigned update timestamp (Unix ms), refreshed on every mutation
    pub updated_at: i64,
}

/// Input for creating a grievance; status and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrievance {
    pub title: String,
    pub description: String,
}

impl NewGrievance {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
