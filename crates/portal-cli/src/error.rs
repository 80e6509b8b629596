use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] portal_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Backend is not configured. Run `portal config init --api-key <KEY> --project-id <ID>`, or set PORTAL_FIREBASE_API_KEY and PORTAL_FIREBASE_PROJECT_ID."
    )]
    BackendNotConfigured,
    #[error("No portal entered yet. Run `portal open <CODE>` or `portal open --new`.")]
    NoActivePortal,
    #[error("Already in portal {0}. Run `portal switch` first to enter a different one.")]
    AlreadyInPortal(String),
    #[error("Invalid meeting date '{0}': expected RFC 3339, e.g. 2025-08-14T19:00:00Z")]
    InvalidDate(String),
    #[error("Grievance ID cannot be empty")]
    EmptyGrievanceId,
    #[error("Grievance not found for id/prefix: {0}")]
    GrievanceNotFound(String),
    #[error("{0}")]
    AmbiguousGrievanceId(String),
    #[error("Live feed ended: {0}")]
    FeedEnded(String),
}
