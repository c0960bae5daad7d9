//! The transport seam consumed by the resource engine
//!
//! Paths handed to a collaborator are relative to the REST base path, e.g.
//! `issueLink/10001` or `issue/PROJ-1/comment`.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// HTTP method of a write call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMethod {
    Post,
    Put,
    Delete,
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteMethod::Post => "POST",
            WriteMethod::Put => "PUT",
            WriteMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Transport used to load and persist resources
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// GET `path` and return the decoded body
    async fn fetch(&self, path: &str) -> Result<Value>;

    /// PUT/POST/DELETE `path`; an empty response body decodes to `Value::Null`
    async fn write(&self, path: &str, method: WriteMethod, body: Option<&Value>) -> Result<Value>;
}
