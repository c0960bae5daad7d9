//! JIRA Client
//!
//! Main client for the JIRA REST API, combining credentials and HTTP
//! functionality. Implements [`Collaborator`] so the resource engine can
//! load and persist resources through it.

use super::auth::{validate_site, Credentials};
use super::http::JiraHttpClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resource::{Collaborator, WriteMethod};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Main JIRA client
#[derive(Clone)]
pub struct JiraClient {
    pub credentials: Credentials,
    pub http: JiraHttpClient,
    /// Site URL plus REST base path, always ending in `/`
    base: Url,
}

impl JiraClient {
    /// Create a new JIRA client
    pub fn new(
        site: &str,
        rest_base_path: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        if !validate_site(site) {
            return Err(Error::validation("JiraClient", format!("invalid site URL {:?}", site)));
        }

        let base = format!(
            "{}/{}/",
            site.trim_end_matches('/'),
            rest_base_path.trim_matches('/')
        );
        let base = Url::parse(&base)
            .map_err(|e| Error::validation("JiraClient", format!("invalid REST base: {}", e)))?;

        let http = JiraHttpClient::new(timeout)?;
        tracing::info!("JIRA client for {} ({:?})", base, credentials);

        Ok(Self {
            credentials,
            http,
            base,
        })
    }

    /// Create a client from resolved configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(site) = config.effective_site() else {
            return Err(Error::validation(
                "JiraClient",
                "no JIRA site configured. Set JIRA_SITE or use --site",
            ));
        };

        Self::new(
            &site,
            &config.api_path(),
            config.effective_credentials(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Absolute URL of a REST path
    pub fn url(&self, path: &str) -> Result<String> {
        self.base
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| Error::validation("JiraClient", format!("invalid path {:?}: {}", path, e)))
    }

    /// The REST base URL
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }
}

#[async_trait]
impl Collaborator for JiraClient {
    async fn fetch(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        self.http.get(&url, &self.credentials).await
    }

    async fn write(&self, path: &str, method: WriteMethod, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path)?;
        match method {
            WriteMethod::Post => self.http.post(&url, &self.credentials, body).await,
            WriteMethod::Put => self.http.put(&url, &self.credentials, body).await,
            WriteMethod::Delete => self.http.delete(&url, &self.credentials).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(site: &str, base: &str) -> JiraClient {
        JiraClient::new(site, base, Credentials::Anonymous, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joins_rest_base() {
        let client = client("https://example.atlassian.net", "/rest/api/2");
        assert_eq!(
            client.url("issueLink/10001").unwrap(),
            "https://example.atlassian.net/rest/api/2/issueLink/10001"
        );
        assert_eq!(
            client.url("/status").unwrap(),
            "https://example.atlassian.net/rest/api/2/status"
        );
    }

    #[test]
    fn test_url_keeps_context_path_and_query() {
        let client = client("https://example.com/", "jira/rest/api/2");
        assert_eq!(
            client.url("version?project=P%201").unwrap(),
            "https://example.com/jira/rest/api/2/version?project=P%201"
        );
    }

    #[test]
    fn test_invalid_site_rejected() {
        let err = JiraClient::new(
            "not a url",
            "/rest/api/2",
            Credentials::Anonymous,
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
