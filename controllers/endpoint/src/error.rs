//! Controller-specific error types.
//!
//! Cloud provider errors arrive already classified by the client crate; the
//! variants here cover what the controller itself can get wrong.

use cloud_client::CloudError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the endpoint controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cloud gateway error
    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Malformed input to a utility (empty name parts, zero length bound)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid or incomplete configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The endpoint reported a state with no automated recovery
    #[error("endpoint in unrecoverable state: {0}")]
    BadEndpointState(String),

    /// The endpoint has no DNS names yet; expected before `available`
    #[error("endpoint has no DNS entries yet")]
    NoEndpointDns,

    /// Finalizer bookkeeping failed
    #[error("finalizer error: {0}")]
    Finalizer(String),
}

impl ControllerError {
    /// Whether the underlying cause is a provider delete refused by a
    /// still-attached dependent. The driver requeues these on a fixed
    /// delay instead of backing off.
    #[must_use]
    pub fn is_dependency_violation(&self) -> bool {
        matches!(
            self,
            ControllerError::Cloud(CloudError::DependencyViolation(_))
        )
    }
}
