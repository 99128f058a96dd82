//! ManagedEndpoint CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the endpoint convergence
//! controller.

pub mod conditions;
pub mod managed_endpoint;

pub use conditions::*;
pub use managed_endpoint::*;
