//! Configuration Management
//!
//! Handles persistent configuration storage for jira-resource.

use crate::jira::auth::{validate_site, Credentials};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_REST_BASE_PATH: &str = "/rest/api/2";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_rest_base_path() -> String {
    DEFAULT_REST_BASE_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// JIRA site URL, e.g. `https://example.atlassian.net`
    #[serde(default)]
    pub site: Option<String>,
    /// Path prefix when JIRA is not served from the site root
    #[serde(default)]
    pub context_path: String,
    /// REST API path below the context path
    #[serde(default = "default_rest_base_path")]
    pub rest_base_path: String,
    #[serde(default)]
    pub auth: Option<Credentials>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: None,
            context_path: String::new(),
            rest_base_path: default_rest_base_path(),
            auth: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("jira-resource").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Could not read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective site (JIRA_SITE > config)
    pub fn effective_site(&self) -> Option<String> {
        if let Ok(site) = std::env::var("JIRA_SITE") {
            if validate_site(&site) {
                return Some(site);
            }
            tracing::warn!("Invalid site URL in JIRA_SITE");
        }
        self.site.clone()
    }

    /// Get effective credentials (environment > config > anonymous)
    pub fn effective_credentials(&self) -> Credentials {
        Credentials::from_env()
            .or_else(|| self.auth.clone())
            .unwrap_or_default()
    }

    /// Context path joined with the REST base path
    pub fn api_path(&self) -> String {
        let context = self.context_path.trim_matches('/');
        let api = self.rest_base_path.trim_matches('/');
        if context.is_empty() {
            format!("/{}", api)
        } else {
            format!("/{}/{}", context, api)
        }
    }

    /// Set site and save
    pub fn set_site(&mut self, site: &str) -> anyhow::Result<()> {
        match Self::config_path() {
            Some(path) => self.set_site_in(site, &path),
            None => anyhow::bail!("no config directory available"),
        }
    }

    /// Set site and save to a specific file
    pub fn set_site_in(&mut self, site: &str, path: &Path) -> anyhow::Result<()> {
        if !validate_site(site) {
            anyhow::bail!("invalid site URL: {}", site);
        }
        self.site = Some(site.to_string());
        self.save_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_path(), "/rest/api/2");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_rest_base_path_with_context() {
        let config = Config {
            context_path: "/jira/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.api_path(), "/jira/rest/api/2");
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("jira-resource-test-{}", std::process::id()));
        let path = dir.join("config.json");

        let config = Config {
            site: Some("https://example.atlassian.net".to_string()),
            auth: Some(Credentials::Bearer {
                token: "pat".to_string(),
            }),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rest_base_path_from_file() {
        let config: Config =
            serde_json::from_str(r#"{"rest_base_path": "rest/api/latest"}"#).unwrap();
        assert_eq!(config.api_path(), "/rest/api/latest");
    }

    #[test]
    fn test_set_site_persists() {
        let dir = std::env::temp_dir().join(format!("jira-resource-site-{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        assert!(config.set_site_in("ftp://example.com", &path).is_err());
        assert!(config.site.is_none());
        assert!(!path.exists());

        config
            .set_site_in("https://example.atlassian.net", &path)
            .unwrap();
        let loaded = Config::load_from(&path);
        assert_eq!(loaded.site.as_deref(), Some("https://example.atlassian.net"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let loaded = Config::load_from(Path::new("/nonexistent/jira-resource/config.json"));
        assert_eq!(loaded, Config::default());
    }
}
