//! Cloud Gateway REST API Client
//!
//! A typed client for the internal cloud gateway fronting the provider's
//! networking and DNS APIs. Capabilities are split per provider area
//! (security groups, endpoints, network discovery, DNS) so callers depend
//! only on the slice they use.
//!
//! # Example
//!
//! ```no_run
//! use cloud_client::{CloudGatewayClient, SecurityGroupOps, Tag};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CloudGatewayClient::new(
//!     "http://cloud-gateway:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let tags = vec![Tag::new("kubernetes.io/cluster/demo", "owned")];
//! let group = client.find_security_group_by_tags(&tags).await?;
//! # let _ = group;
//! # Ok(())
//! # }
//! ```
//!
//! # Error classification
//!
//! Provider error codes are mapped to a closed set of [`CloudError`] kinds
//! at this boundary; callers match on variants like
//! [`CloudError::DependencyViolation`] instead of parsing code strings.

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cloud_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::CloudGatewayClient;
pub use cloud_trait::{CloudClientTrait, DnsOps, EndpointOps, NetworkOps, SecurityGroupOps, TagOps};
pub use common::HttpClient;
pub use error::CloudError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockCloudClient, MockFailure};
