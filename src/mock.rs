//! # In-memory collaborator
//!
//! `MockClient` implements [`Collaborator`] without any network access. Routes
//! map a path to a canned body or an injected HTTP failure, every fetch is
//! counted per path, and every write is recorded, so tests can assert exactly
//! when the resource engine performs I/O.
//!
//! ```rust
//! use jira_resource::mock::MockClient;
//! use jira_resource::resource::ResourceFactory;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(MockClient::new());
//!     client.respond("issue/PROJ-2", json!({"key": "PROJ-2"}));
//!
//!     let factory = ResourceFactory::with_builtin_types(client.clone());
//!     let link = factory
//!         .build("Issuelink", None, json!({"id": "1", "inwardIssue": "PROJ-2"}))
//!         .unwrap();
//!
//!     link.one("inwardIssue").await.unwrap();
//!     link.one("inwardIssue").await.unwrap();
//!     assert_eq!(client.fetch_count("issue/PROJ-2"), 1);
//! }
//! ```

use crate::error::{Error, Result};
use crate::resource::{Collaborator, WriteMethod};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One recorded write call
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub method: WriteMethod,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
enum Route {
    Body(Value),
    Status(u16),
}

#[derive(Default)]
struct State {
    reads: HashMap<String, Route>,
    writes: HashMap<(String, WriteMethod), Route>,
    /// Pending one-shot failures, consumed before the route
    failures: HashMap<String, Vec<u16>>,
    fetch_counts: HashMap<String, usize>,
    write_log: Vec<WriteCall>,
}

/// In-memory [`Collaborator`] with fetch counting and failure injection
#[derive(Default)]
pub struct MockClient {
    state: Mutex<State>,
    delay: Option<Duration>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serve `body` for GETs of `path`
    pub fn respond(&self, path: &str, body: Value) {
        self.lock().reads.insert(path.to_string(), Route::Body(body));
    }

    /// Fail every GET of `path` with `status`
    pub fn fail(&self, path: &str, status: u16) {
        self.lock().reads.insert(path.to_string(), Route::Status(status));
    }

    /// Fail the next `times` GETs of `path`, then fall back to its route
    pub fn fail_times(&self, path: &str, status: u16, times: usize) {
        self.lock()
            .failures
            .entry(path.to_string())
            .or_default()
            .extend(std::iter::repeat(status).take(times));
    }

    /// Serve `body` for writes of `method` to `path`
    pub fn respond_write(&self, path: &str, method: WriteMethod, body: Value) {
        self.lock()
            .writes
            .insert((path.to_string(), method), Route::Body(body));
    }

    /// Fail writes of `method` to `path` with `status`
    pub fn fail_write(&self, path: &str, method: WriteMethod, status: u16) {
        self.lock()
            .writes
            .insert((path.to_string(), method), Route::Status(status));
    }

    /// Number of GETs issued for `path`
    pub fn fetch_count(&self, path: &str) -> usize {
        self.lock().fetch_counts.get(path).copied().unwrap_or(0)
    }

    /// Number of GETs issued for any path
    pub fn total_fetches(&self) -> usize {
        self.lock().fetch_counts.values().sum()
    }

    /// Recorded write calls, oldest first
    pub fn writes(&self) -> Vec<WriteCall> {
        self.lock().write_log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn answer(route: Option<Route>, path: &str, missing: Route) -> Result<Value> {
    match route.unwrap_or(missing) {
        Route::Body(body) => Ok(body),
        Route::Status(status) => Err(Error::Http {
            status,
            path: path.to_string(),
        }),
    }
}

#[async_trait]
impl Collaborator for MockClient {
    async fn fetch(&self, path: &str) -> Result<Value> {
        let route = {
            let mut state = self.lock();
            *state.fetch_counts.entry(path.to_string()).or_insert(0) += 1;

            let injected = state
                .failures
                .get_mut(path)
                .filter(|pending| !pending.is_empty())
                .map(|pending| pending.remove(0));

            match injected {
                Some(status) => Some(Route::Status(status)),
                None => state.reads.get(path).cloned(),
            }
        };

        tracing::debug!("mock GET {}", path);
        self.pause().await;
        answer(route, path, Route::Status(404))
    }

    async fn write(&self, path: &str, method: WriteMethod, body: Option<&Value>) -> Result<Value> {
        let route = {
            let mut state = self.lock();
            state.write_log.push(WriteCall {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });
            state.writes.get(&(path.to_string(), method)).cloned()
        };

        tracing::debug!("mock {} {}", method, path);
        self.pause().await;
        answer(route, path, Route::Body(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let client = MockClient::new();
        let err = client.fetch("issue/NOPE-1").await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 404, .. }));
        assert_eq!(client.fetch_count("issue/NOPE-1"), 1);
    }

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let client = MockClient::new();
        client.respond("status/1", json!({"id": "1"}));
        client.fail_times("status/1", 503, 2);

        assert!(client.fetch("status/1").await.is_err());
        assert!(client.fetch("status/1").await.is_err());
        assert_eq!(client.fetch("status/1").await.unwrap(), json!({"id": "1"}));
        assert_eq!(client.fetch_count("status/1"), 3);
    }

    #[tokio::test]
    async fn test_writes_are_recorded() {
        let client = MockClient::new();
        let body = json!({"name": "x"});
        let response = client
            .write("version", WriteMethod::Post, Some(&body))
            .await
            .unwrap();

        assert_eq!(response, Value::Null);
        assert_eq!(
            client.writes(),
            vec![WriteCall {
                method: WriteMethod::Post,
                path: "version".to_string(),
                body: Some(body),
            }]
        );
    }
}
