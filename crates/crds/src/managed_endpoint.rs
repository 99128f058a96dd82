//! ManagedEndpoint CRD
//!
//! Declares a private network endpoint to a cloud service, together with the
//! security group, hosted-zone record, and in-cluster alias service that
//! front it. The spec is user intent; the status is owned by the controller
//! and is the single source of truth for which provider resources the
//! controller currently holds.

use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "network.cloudnet.dev",
    version = "v1alpha1",
    kind = "ManagedEndpoint",
    namespaced,
    status = "ManagedEndpointStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEndpointSpec {
    /// Target endpoint service identifier. Wins over `serviceRef` when both
    /// are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Indirect service reference, resolved through a ConfigMap key in the
    /// object's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ref: Option<ServiceRef>,

    /// Ingress/egress rules for the managed security group. The rule source
    /// is always the cluster's node security groups, resolved by tag.
    #[serde(default)]
    pub security_group: SecurityGroupSpec,

    /// Network placement. Absent fields are auto-discovered from cluster
    /// tags.
    #[serde(default)]
    pub network: NetworkSpec,

    /// Optional private DNS for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_dns: Option<CustomDnsSpec>,

    /// Name of an in-cluster ExternalName Service aliasing the DNS record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_service_name: Option<String>,

    /// Secret holding a gateway token for cross-account access. The secret
    /// must carry a `token` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<String>,

    /// Region override; defaults to the cluster's region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Indirect service reference: a ConfigMap key holding the service
/// identifier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    /// Name of the ConfigMap.
    pub name: String,

    /// Key within the ConfigMap; defaults to `serviceName`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Desired security group rules.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    /// Ingress rules to authorize on the managed group.
    #[serde(default)]
    pub ingress_rules: Vec<PortRule>,

    /// Egress rules to authorize on the managed group.
    #[serde(default)]
    pub egress_rules: Vec<PortRule>,
}

/// A single port-range rule. The source/destination is implicit: the
/// cluster's node security groups.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortRule {
    /// First port in the range.
    pub from_port: i32,

    /// Last port in the range.
    pub to_port: i32,

    /// IP protocol ("tcp", "udp", ...).
    pub protocol: String,
}

/// Network placement for the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// VPC to place the endpoint in; defaults to the cluster's VPC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,

    /// Explicit subnet ids. Absent means auto-discover the cluster's
    /// internal load-balancer subnets by tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_ids: Option<Vec<String>>,
}

/// Private DNS configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomDnsSpec {
    /// Discover the cluster's existing private zone by base domain.
    #[serde(default)]
    pub auto_discover: bool,

    /// Use an existing hosted zone by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,

    /// Create a private zone with this domain. Zones created this way are
    /// deleted again on teardown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,

    /// Record to upsert inside the zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordSpec>,
}

/// Record inside the hosted zone, pointing at the endpoint's DNS name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    /// Hostname part of the record; the zone's domain is appended.
    pub hostname: String,
}

/// Observed state, mutated only by the controller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEndpointStatus {
    /// Mirrors the provider's last-known endpoint state
    /// (e.g. "pendingAcceptance", "available", "deleting").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Id of the managed security group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,

    /// Id of the managed network endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,

    /// Id of the hosted zone in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,

    /// Fully qualified name of the upserted record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,

    /// Per-subresource readiness conditions, at most one per type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
