//! Persistent CLI configuration and local file locations.

use std::env;
use std::path::{Path, PathBuf};

use portal_core::util::{is_http_url, normalize_text_option};
use portal_core::{AppConfig, FirestoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const APP_DIR_NAME: &str = "grievance-portal";
const CONFIG_FILE_NAME: &str = "cli-config.json";
const PREFS_FILE_NAME: &str = "preferences.json";

pub const API_KEY_ENV: &str = "PORTAL_FIREBASE_API_KEY";
pub const PROJECT_ID_ENV: &str = "PORTAL_FIREBASE_PROJECT_ID";
const PREFS_PATH_ENV: &str = "PORTAL_PREFS_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub firestore: FirestoreSection,
    /// Portal rule overrides; built-in defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirestoreSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_token_url: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(CONFIG_FILE_NAME)
}

pub fn default_prefs_path() -> PathBuf {
    app_dir(dirs::data_dir()).join(PREFS_FILE_NAME)
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path.unwrap_or_else(default_config_path)
}

pub fn resolve_prefs_path(cli_prefs_path: Option<PathBuf>) -> PathBuf {
    cli_prefs_path
        .or_else(|| env::var_os(PREFS_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_prefs_path)
}

/// Mask all but the last four characters of a secret.
pub fn redact_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("****{tail}")
}

impl CliConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Portal rules: the `app` overrides when present, else defaults.
    pub fn app_config(&self) -> Result<AppConfig, CliError> {
        let config = self.app.clone().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Backend settings with environment overrides applied.
    pub fn firestore_config(&self) -> Result<FirestoreConfig, CliError> {
        self.firestore
            .resolve(env::var(API_KEY_ENV).ok(), env::var(PROJECT_ID_ENV).ok())
    }

    fn normalize(&mut self) {
        self.firestore.normalize();
    }
}

impl FirestoreSection {
    /// Merge environment values over the file and build a validated config.
    pub fn resolve(
        &self,
        env_api_key: Option<String>,
        env_project_id: Option<String>,
    ) -> Result<FirestoreConfig, CliError> {
        let api_key = normalize_text_option(env_api_key)
            .or_else(|| normalize_text_option(self.api_key.clone()))
            .ok_or(CliError::BackendNotConfigured)?;
        let project_id = normalize_text_option(env_project_id)
            .or_else(|| normalize_text_option(self.project_id.clone()))
            .ok_or(CliError::BackendNotConfigured)?;

        let mut config = FirestoreConfig::new(api_key, project_id);
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(url) = normalize_text_option(self.firestore_url.clone()) {
            config.firestore_url = url;
        }
        if let Some(url) = normalize_text_option(self.identity_url.clone()) {
            config.identity_url = url;
        }
        if let Some(url) = normalize_text_option(self.secure_token_url.clone()) {
            config.secure_token_url = url;
        }
        Ok(config.normalized()?)
    }

    pub fn validate_urls(&self) -> Result<(), CliError> {
        for (field, value) in [
            ("firestore_url", &self.firestore_url),
            ("identity_url", &self.identity_url),
            ("secure_token_url", &self.secure_token_url),
        ] {
            if let Some(url) = normalize_text_option(value.clone()) {
                if !is_http_url(&url) {
                    return Err(CliError::Config(format!(
                        "{field} must include http:// or https://"
                    )));
                }
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.api_key = normalize_text_option(self.api_key.take());
        self.project_id = normalize_text_option(self.project_id.take());
        self.firestore_url = normalize_text_option(self.firestore_url.take());
        self.identity_url = normalize_text_option(self.identity_url.take());
        self.secure_token_url = normalize_text_option(self.secure_token_url.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn config_roundtrip_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = CliConfig {
            version: 1,
            firestore: FirestoreSection {
                api_key: Some(" key-123 ".to_string()),
                project_id: Some("grievance-portal".to_string()),
                firestore_url: Some("   ".to_string()),
                ..FirestoreSection::default()
            },
            app: None,
        };

        config.save_to_path(&path).unwrap();
        let loaded = CliConfig::load_from_path(&path).unwrap();

        assert_eq!(loaded.firestore.api_key.as_deref(), Some("key-123"));
        assert_eq!(loaded.firestore.firestore_url, None);
    }

    #[test]
    fn unparsable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        let error = CliConfig::load_from_path(&path).unwrap_err();
        assert!(error.contains("Failed to parse config"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let section = FirestoreSection {
            api_key: Some("file-key".to_string()),
            project_id: Some("file-project".to_string()),
            ..FirestoreSection::default()
        };

        let config = section
            .resolve(Some("env-key".to_string()), Some("  ".to_string()))
            .unwrap();

        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.project_id, "file-project");
    }

    #[test]
    fn missing_credentials_are_not_configured() {
        let error = FirestoreSection::default().resolve(None, None).unwrap_err();
        assert!(matches!(error, CliError::BackendNotConfigured));
    }

    #[test]
    fn endpoint_overrides_are_applied() {
        let section = FirestoreSection {
            api_key: Some("key".to_string()),
            project_id: Some("project".to_string()),
            poll_interval_ms: Some(500),
            firestore_url: Some("http://localhost:8080/v1/".to_string()),
            ..FirestoreSection::default()
        };

        let config = section.resolve(None, None).unwrap();

        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.firestore_url, "http://localhost:8080/v1");
    }

    #[test]
    fn non_http_overrides_are_rejected() {
        let section = FirestoreSection {
            identity_url: Some("localhost:9099".to_string()),
            ..FirestoreSection::default()
        };
        assert!(section.validate_urls().is_err());
    }

    #[test]
    fn secrets_are_redacted() {
        assert_eq!(redact_secret("AIzaSyExample1234"), "****1234");
        assert_eq!(redact_secret("abc"), "****");
    }
}
