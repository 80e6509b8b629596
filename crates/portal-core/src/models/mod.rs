//! Data models for Grievance Portal

mod filter;
mod grievance;
mod portal;

pub use filter::{filter_grievances, StatusFilter};
pub use grievance::{Grievance, GrievanceId, GrievanceStatus, NewGrievance};
pub use portal::PortalCode;
