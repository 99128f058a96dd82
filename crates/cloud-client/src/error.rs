//! Cloud gateway client errors.
//!
//! Provider error codes are classified here, once, into a closed set of
//! kinds. Callers match on variants instead of re-parsing provider code
//! strings at every call site.

use thiserror::Error;

/// Errors that can occur when interacting with the cloud gateway API.
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error not covered by a specific kind
    #[error("cloud API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Resource not found by id. Discovery treats this as "absent".
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (missing required fields, malformed identifiers)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Delete refused because another resource still references the target.
    /// Expected during teardown while the provider unwinds dependents.
    #[error("dependency violation: {0}")]
    DependencyViolation(String),

    /// The token is valid but not permitted to perform this action.
    #[error("unauthorized operation {action}: {message}")]
    Unauthorized {
        /// The attempted gateway action, e.g. "CreateSecurityGroup".
        action: String,
        /// Provider-supplied detail.
        message: String,
    },

    /// Provider throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl CloudError {
    /// Whether this error is the by-id "resource absent" case that discovery
    /// swallows.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// Whether this error is a delete refused by a still-attached dependent.
    #[must_use]
    pub fn is_dependency_violation(&self) -> bool {
        matches!(self, CloudError::DependencyViolation(_))
    }
}
