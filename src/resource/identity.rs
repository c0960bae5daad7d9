//! Resource identity - endpoint names and REST paths
//!
//! Paths are relative to the REST base path (`/rest/api/2`); the HTTP client
//! joins them onto the site URL.

use super::registry::ResourceType;
use crate::error::{Error, Result};

impl ResourceType {
    /// REST path segment for this type.
    ///
    /// An explicit override wins; otherwise the type name lower-cased, which
    /// matches JIRA's singular collection paths (`issue`, `status`, ...).
    pub fn endpoint_name(&self) -> String {
        match self.endpoint_name {
            Some(ref endpoint) => endpoint.clone(),
            None => self.name.to_lowercase(),
        }
    }

    /// Collection path, optionally under an owner's item path
    pub fn collection_path(&self, prefix: Option<&str>) -> String {
        match prefix {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), self.endpoint_name())
            }
            _ => self.endpoint_name(),
        }
    }

    /// Item path for a single instance of this type
    pub fn item_path(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(format!("{}/{}", self.endpoint_name(), key))
    }
}

/// Check that `key` can be used as a single path segment
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key is empty",
        });
    }
    if key.contains('/') {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key contains a path separator",
        });
    }
    Ok(())
}

/// Append query parameters to a path, percent-encoding the values
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, query)
}
