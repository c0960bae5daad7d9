//! Error types
//!
//! Every failure surfaced by the resource engine is one of three kinds:
//! bad input at construction time ([`Error::Validation`]), a key that cannot
//! form a path ([`Error::InvalidKey`]), or a collaborator failure hit while
//! resolving an association or running a lifecycle call ([`Error::Resolution`]).
//! The remaining variants describe the underlying cause and normally arrive
//! wrapped inside a `Resolution`.

use thiserror::Error;

/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for resource operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing identity data, or an illegal declaration.
    #[error("Validation failed for {resource}: {message}")]
    Validation { resource: String, message: String },

    /// A key that cannot be turned into an item path.
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A collaborator failure while resolving `operation`.
    #[error("Could not resolve {operation}: {source}")]
    Resolution {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// Non-2xx response.
    #[error("API request failed: {status} for {path}")]
    Http { status: u16, path: String },

    /// Network or client failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("Malformed payload from {path}: {message}")]
    Malformed { path: String, message: String },

    /// A symbolic type reference that the registry cannot resolve.
    #[error("Unknown resource type: {0}")]
    UnknownType(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(resource: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Wrap `cause` as a retryable resolution failure.
    pub fn resolution(operation: impl Into<String>, cause: Error) -> Self {
        Self::Resolution {
            operation: operation.into(),
            source: Box::new(cause),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }

    /// Whether re-invoking the failed access may succeed.
    ///
    /// A resolution failure is retryable unless its root cause is local
    /// (bad key data or an unregistered type), which no retry can change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::InvalidKey { .. } => false,
            Self::Resolution { .. } => !matches!(
                self.root_cause(),
                Self::Validation { .. } | Self::InvalidKey { .. } | Self::UnknownType(_)
            ),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            Self::Malformed { .. } | Self::UnknownType(_) | Self::Json(_) => false,
        }
    }

    /// The innermost cause, unwrapping nested resolution failures.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Resolution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// HTTP status of the root cause, if it was a status failure.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_wraps_cause() {
        let cause = Error::Http {
            status: 404,
            path: "issue/10001".to_string(),
        };
        let err = Error::resolution("Issuelink.inwardIssue", cause);

        assert!(err.is_resolution());
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Issuelink.inwardIssue"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_root_cause_unwraps_nesting() {
        let inner = Error::resolution("Issue.status", Error::UnknownType("Status".into()));
        let outer = Error::resolution("Issuelink.inwardIssue", inner);

        assert!(matches!(outer.root_cause(), Error::UnknownType(name) if name == "Status"));
    }

    #[test]
    fn test_local_errors_are_not_retryable() {
        assert!(!Error::validation("Issue", "missing key").is_retryable());
        assert!(!Error::InvalidKey {
            key: String::new(),
            reason: "key is empty",
        }
        .is_retryable());
    }

    #[test]
    fn test_resolution_of_local_cause_is_not_retryable() {
        let err = Error::resolution(
            "Issuelink.outwardIssue",
            Error::InvalidKey {
                key: "A/B".to_string(),
                reason: "key contains a path separator",
            },
        );
        assert!(err.is_resolution());
        assert!(!err.is_retryable());

        let err = Error::resolution("Ticket.owner", Error::UnknownType("Person".into()));
        assert!(!err.is_retryable());
    }
}
