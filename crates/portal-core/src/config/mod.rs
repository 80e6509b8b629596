//! Static application configuration and hosted backend settings.
//!
//! `AppConfig` carries the portal rules (code length, description limit,
//! status labels) shared by every client; `FirestoreConfig` carries the
//! public endpoints/keys needed to reach the hosted document database.
//! Secret credentials must never be stored here.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::GrievanceStatus;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_PORTAL_ID_LENGTH: usize = 6;
const DEFAULT_MAX_GRIEVANCE_LENGTH: usize = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const MIN_POLL_INTERVAL_MS: u64 = 250;

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Display metadata for one status value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusOption {
    pub status: GrievanceStatus,
    pub label: String,
    pub color: String,
}

impl StatusOption {
    fn new(status: GrievanceStatus, label: &str, color: &str) -> Self {
        Self {
            status,
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

/// Portal rules shared by all clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Exact length of a portal code
    pub portal_id_length: usize,
    /// Maximum description length in characters
    pub max_grievance_length: usize,
    /// Countdown target used when no meeting date has been saved
    pub default_meeting_target: Option<DateTime<Utc>>,
    pub status_options: Vec<StatusOption>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Grievance Portal".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            portal_id_length: DEFAULT_PORTAL_ID_LENGTH,
            max_grievance_length: DEFAULT_MAX_GRIEVANCE_LENGTH,
            default_meeting_target: Utc.with_ymd_and_hms(2025, 8, 14, 19, 0, 0).single(),
            status_options: vec![
                StatusOption::new(GrievanceStatus::Pending, "Pending", "status-pending"),
                StatusOption::new(
                    GrievanceStatus::InProgress,
                    "In Progress",
                    "status-in-progress",
                ),
                StatusOption::new(GrievanceStatus::Resolved, "Resolved", "status-resolved"),
            ],
        }
    }
}

impl AppConfig {
    /// Parse a config from JSON, filling omitted fields with defaults.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.portal_id_length == 0 {
            return Err(Error::Config(
                "portal_id_length must be greater than zero".to_string(),
            ));
        }
        if self.max_grievance_length == 0 {
            return Err(Error::Config(
                "max_grievance_length must be greater than zero".to_string(),
            ));
        }
        for status in GrievanceStatus::ALL {
            let count = self
                .status_options
                .iter()
                .filter(|option| option.status == status)
                .count();
            if count != 1 {
                return Err(Error::Config(format!(
                    "status_options must list '{status}' exactly once"
                )));
            }
        }
        Ok(())
    }

    /// Display metadata for a status, falling back to the built-in label.
    pub fn status_option(&self, status: GrievanceStatus) -> StatusOption {
        self.status_options
            .iter()
            .find(|option| option.status == status)
            .cloned()
            .unwrap_or_else(|| {
                StatusOption::new(status, status.label(), &format!("status-{status}"))
            })
    }
}

/// Hosted Firestore project settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirestoreConfig {
    pub api_key: String,
    pub project_id: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    #[serde(default = "default_secure_token_url")]
    pub secure_token_url: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
}

impl FirestoreConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            identity_url: default_identity_url(),
            secure_token_url: default_secure_token_url(),
            firestore_url: default_firestore_url(),
        }
    }

    /// Trim every field, strip trailing slashes from URLs and reject
    /// missing keys or non-http endpoints.
    pub fn normalized(self) -> Result<Self> {
        let api_key = normalize_required_value(self.api_key, "api_key")?;
        let project_id = normalize_required_value(self.project_id, "project_id")?;

        Ok(Self {
            api_key,
            project_id,
            poll_interval_ms: self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS),
            identity_url: normalize_required_http_url(self.identity_url, "identity_url")?,
            secure_token_url: normalize_required_http_url(
                self.secure_token_url,
                "secure_token_url",
            )?,
            firestore_url: normalize_required_http_url(self.firestore_url, "firestore_url")?,
        })
    }

    /// Root of the document tree, e.g. `.../projects/p/databases/(default)/documents`.
    pub fn documents_url(&self) -> String {
        format!("{}/{}", self.firestore_url, self.documents_path())
    }

    /// Resource name prefix used inside commit requests.
    pub fn documents_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_secure_token_url() -> String {
    DEFAULT_SECURE_TOKEN_URL.to_string()
}

fn default_firestore_url() -> String {
    DEFAULT_FIRESTORE_URL.to_string()
}

fn normalize_required_value(raw: String, field: &str) -> Result<String> {
    normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config(format!("firestore field '{field}' is required")))
}

fn normalize_required_http_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_required_value(raw, field)?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "firestore field '{field}' must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_lists_each_status_once() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.portal_id_length, 6);
        assert_eq!(config.max_grievance_length, 500);
        assert_eq!(
            config.status_option(GrievanceStatus::InProgress).label,
            "In Progress"
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "max_grievance_length": 80 }"#).unwrap();
        assert_eq!(config.max_grievance_length, 80);
        assert_eq!(config.portal_id_length, 6);
        assert_eq!(config.status_options.len(), 3);
    }

    #[test]
    fn json_rejects_unknown_fields_and_zero_lengths() {
        assert!(AppConfig::from_json(r#"{ "unexpected": true }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "portal_id_length": 0 }"#).is_err());
    }

    #[test]
    fn json_rejects_duplicate_status_options() {
        let payload = r#"
        {
          "status_options": [
            { "status": "pending", "label": "Pending", "color": "a" },
            { "status": "pending", "label": "Again", "color": "b" },
            { "status": "resolved", "label": "Resolved", "color": "c" }
          ]
        }
        "#;
        let error = AppConfig::from_json(payload).unwrap_err();
        assert!(error.to_string().contains("exactly once"));
    }

    #[test]
    fn firestore_config_normalizes_urls() {
        let mut config = FirestoreConfig::new(" key ", " project ");
        config.firestore_url = "http://localhost:8080/v1/".to_string();
        config.poll_interval_ms = 10;
        let config = config.normalized().unwrap();

        assert_eq!(config.api_key, "key");
        assert_eq!(config.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(
            config.documents_url(),
            "http://localhost:8080/v1/projects/project/databases/(default)/documents"
        );
    }

    #[test]
    fn firestore_config_rejects_missing_key_and_bad_scheme() {
        assert!(FirestoreConfig::new("  ", "project").normalized().is_err());

        let mut config = FirestoreConfig::new("key", "project");
        config.identity_url = "identitytoolkit.googleapis.com".to_string();
        assert!(config.normalized().is_err());
    }
}
