//! portal-core - Core library for Grievance Portal
//!
//! This crate contains the shared models, live feed plumbing, session state
//! and countdown logic used by every Grievance Portal interface.

pub mod config;
pub mod countdown;
pub mod error;
pub mod models;
pub mod prefs;
pub mod remote;
pub mod session;
pub mod util;
pub mod view;

pub use config::{AppConfig, FirestoreConfig};
pub use countdown::{time_remaining, Countdown, CountdownState, TimeRemaining};
pub use error::{Error, ErrorKind, RemoteFault, Result};
pub use models::{Grievance, GrievanceId, GrievanceStatus, NewGrievance, PortalCode, StatusFilter};
pub use session::{Notification, NotificationLevel, PortalSession, Screen, VisibleItems};
pub use view::{GrievanceCard, ListView, MainView, PortalView};
