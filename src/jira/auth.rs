//! JIRA Authentication
//!
//! Basic auth with an API token (JIRA Cloud), bearer personal access tokens
//! (JIRA Data Center), or anonymous access.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials attached to every request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    Basic { username: String, token: String },
    Bearer { token: String },
    #[default]
    Anonymous,
}

impl Credentials {
    /// Attach these credentials to a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Basic { username, token } => request.basic_auth(username, Some(token)),
            Credentials::Bearer { token } => request.bearer_auth(token),
            Credentials::Anonymous => request,
        }
    }

    /// Read credentials from the environment
    ///
    /// `JIRA_BEARER_TOKEN` wins over `JIRA_USERNAME` + `JIRA_API_TOKEN`.
    pub fn from_env() -> Option<Self> {
        if let Some(token) = non_empty_var("JIRA_BEARER_TOKEN") {
            return Some(Credentials::Bearer { token });
        }

        match (non_empty_var("JIRA_USERNAME"), non_empty_var("JIRA_API_TOKEN")) {
            (Some(username), Some(token)) => Some(Credentials::Basic { username, token }),
            (Some(_), None) => {
                tracing::warn!("JIRA_USERNAME is set but JIRA_API_TOKEN is not");
                None
            }
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

// Tokens never reach logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("token", &"***")
                .finish(),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a JIRA site URL
/// Must be an absolute http(s) URL without query or fragment
pub fn validate_site(site: &str) -> bool {
    match url::Url::parse(site) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
