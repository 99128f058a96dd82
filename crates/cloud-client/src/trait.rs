//! Capability traits for the cloud gateway client.
//!
//! Each provider area gets its own narrow trait so reconcilers depend only
//! on the capability they use. The concrete client and the mock implement
//! all of them; `CloudClientTrait` bundles them for wiring.

use crate::error::CloudError;
use crate::models::*;

/// Tag creation. Idempotent and additive; never removes unrelated tags.
#[async_trait::async_trait]
pub trait TagOps: Send + Sync {
    /// Apply tags to a resource, overwriting same-key values.
    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), CloudError>;
}

/// Security group CRUD and rule authorization.
#[async_trait::async_trait]
pub trait SecurityGroupOps: TagOps {
    /// Look up a group by id. `NotFound` means the id is stale.
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, CloudError>;

    /// Search for a group carrying all of the given tags. No match is
    /// `Ok(None)`, not an error.
    async fn find_security_group_by_tags(
        &self,
        tags: &[Tag],
    ) -> Result<Option<SecurityGroup>, CloudError>;

    /// Create a group in the VPC with the given tags.
    async fn create_security_group(
        &self,
        name: &str,
        vpc_id: &str,
        tags: &[Tag],
    ) -> Result<SecurityGroup, CloudError>;

    /// Delete a group. Fails with `DependencyViolation` while still attached
    /// to an endpoint.
    async fn delete_security_group(&self, id: &str) -> Result<(), CloudError>;

    /// Enumerate existing rules on a group.
    async fn describe_security_group_rules(
        &self,
        group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>, CloudError>;

    /// Authorize a batch of rules, tagging the created rules. Not
    /// transactional: a partial failure leaves the applied subset in place.
    async fn authorize_security_group_rules(
        &self,
        group_id: &str,
        egress: bool,
        permissions: &[IpPermission],
        tags: &[Tag],
    ) -> Result<(), CloudError>;
}

/// Network endpoint CRUD and membership modification.
#[async_trait::async_trait]
pub trait EndpointOps: TagOps {
    /// Look up an endpoint by id. `NotFound` means the id is stale.
    async fn get_endpoint(&self, id: &str) -> Result<VpcEndpoint, CloudError>;

    /// Search for an endpoint carrying all of the given tags.
    async fn find_endpoint_by_tags(&self, tags: &[Tag])
    -> Result<Option<VpcEndpoint>, CloudError>;

    /// Create an endpoint to the given service.
    async fn create_endpoint(
        &self,
        name: &str,
        vpc_id: &str,
        service_name: &str,
        tags: &[Tag],
    ) -> Result<VpcEndpoint, CloudError>;

    /// Delete an endpoint. The provider tears it down asynchronously.
    async fn delete_endpoint(&self, id: &str) -> Result<(), CloudError>;

    /// Attach subnets to an endpoint.
    async fn add_endpoint_subnets(&self, id: &str, subnet_ids: &[String])
    -> Result<(), CloudError>;

    /// Detach subnets from an endpoint.
    async fn remove_endpoint_subnets(
        &self,
        id: &str,
        subnet_ids: &[String],
    ) -> Result<(), CloudError>;

    /// Attach security groups to an endpoint.
    async fn add_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError>;

    /// Detach security groups from an endpoint.
    async fn remove_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError>;
}

/// Read-only discovery of cluster networking resources. Nothing reached
/// through this trait is ever mutated by the controller.
#[async_trait::async_trait]
pub trait NetworkOps: Send + Sync {
    /// Find the VPC carrying the cluster tag.
    async fn find_vpc_by_tag(&self, tag_key: &str) -> Result<Option<Vpc>, CloudError>;

    /// Subnets tagged for internal load-balancer use, filtered by cluster
    /// tag.
    async fn list_private_subnets(&self, cluster_tag: &str) -> Result<Vec<Subnet>, CloudError>;

    /// The cluster's node security groups, resolved by cluster tag.
    async fn find_node_security_groups(
        &self,
        cluster_tag: &str,
    ) -> Result<Vec<SecurityGroup>, CloudError>;
}

/// Hosted zone and record lifecycle.
#[async_trait::async_trait]
pub trait DnsOps: Send + Sync {
    /// Look up a zone by id.
    async fn get_hosted_zone(&self, id: &str) -> Result<HostedZone, CloudError>;

    /// Find a private zone by its apex domain. No match is `Ok(None)`.
    async fn find_hosted_zone_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<HostedZone>, CloudError>;

    /// Create a private zone attached to the VPC.
    async fn create_hosted_zone(
        &self,
        domain: &str,
        vpc_id: &str,
        region: &str,
    ) -> Result<HostedZone, CloudError>;

    /// Delete a zone.
    async fn delete_hosted_zone(&self, id: &str) -> Result<(), CloudError>;

    /// Idempotent upsert of a CNAME-style record: same key, replace value.
    async fn upsert_record(&self, zone_id: &str, name: &str, target: &str)
    -> Result<(), CloudError>;

    /// Delete a record by name.
    async fn delete_record(&self, zone_id: &str, name: &str) -> Result<(), CloudError>;
}

/// The full client surface, for wiring and for call sites that span areas.
pub trait CloudClientTrait:
    SecurityGroupOps + EndpointOps + NetworkOps + DnsOps + Send + Sync
{
}

impl<T> CloudClientTrait for T where T: SecurityGroupOps + EndpointOps + NetworkOps + DnsOps {}
