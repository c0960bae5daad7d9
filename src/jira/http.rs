//! HTTP utilities for JIRA REST API calls

use super::auth::Credentials;
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for JIRA API calls
#[derive(Clone)]
pub struct JiraHttpClient {
    client: Client,
}

impl JiraHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jira-resource/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, credentials: &Credentials) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let request = credentials.apply(self.client.get(url));
        self.send(request, url, false).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, credentials: &Credentials, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let request = with_body(credentials.apply(self.client.post(url)), body);
        self.send(request, url, true).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, credentials: &Credentials, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("PUT {}", url);
        let request = with_body(credentials.apply(self.client.put(url)), body);
        self.send(request, url, true).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, credentials: &Credentials) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        let request = credentials.apply(self.client.delete(url));
        self.send(request, url, true).await
    }

    async fn send(&self, request: RequestBuilder, url: &str, allow_empty: bool) -> Result<Value> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(Error::Http {
                status: status.as_u16(),
                path: url.to_string(),
            });
        }

        // Handle empty response
        if body.trim().is_empty() {
            if allow_empty {
                return Ok(Value::Null);
            }
            return Err(Error::Malformed {
                path: url.to_string(),
                message: "empty response body".to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Malformed {
            path: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn with_body(request: RequestBuilder, body: Option<&Value>) -> RequestBuilder {
    match body {
        Some(body) => request.json(body),
        None => request,
    }
}

/// Format a JIRA API error for display
pub fn format_jira_error(error: &Error) -> String {
    match error.status() {
        Some(401) => return "Authentication failed. Check your username and API token.".to_string(),
        Some(403) => return "Permission denied. Check your JIRA project permissions.".to_string(),
        Some(404) => return "Resource not found.".to_string(),
        Some(409) => return "Resource conflict. The resource may have changed.".to_string(),
        Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
        Some(400) => return "Invalid request. Check your parameters.".to_string(),
        Some(500..=599) => return "JIRA service temporarily unavailable. Please try again.".to_string(),
        _ => {}
    }

    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
