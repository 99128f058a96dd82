//! Typed models for the cloud gateway API.

use serde::{Deserialize, Serialize};

/// A provider resource tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Convenience constructor.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A security group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Provider id (e.g. "sg-0123").
    pub id: String,
    /// Owning VPC.
    pub vpc_id: String,
    /// Group name.
    pub name: String,
    /// Tags on the group.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// An existing rule on a security group, as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Rule id.
    pub id: String,
    /// Group the rule belongs to.
    pub group_id: String,
    /// True for egress, false for ingress.
    pub is_egress: bool,
    /// IP protocol.
    pub protocol: String,
    /// First port in range.
    pub from_port: i32,
    /// Last port in range.
    pub to_port: i32,
    /// Referenced source (ingress) or destination (egress) group, if any.
    #[serde(default)]
    pub source_group_id: Option<String>,
}

/// A permission to authorize on a security group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpPermission {
    /// IP protocol.
    pub protocol: String,
    /// First port in range.
    pub from_port: i32,
    /// Last port in range.
    pub to_port: i32,
    /// Referenced source/destination group.
    pub source_group_id: String,
}

impl IpPermission {
    /// Whether an existing provider rule matches this permission exactly.
    #[must_use]
    pub fn matches(&self, rule: &SecurityGroupRule) -> bool {
        rule.protocol == self.protocol
            && rule.from_port == self.from_port
            && rule.to_port == self.to_port
            && rule.source_group_id.as_deref() == Some(self.source_group_id.as_str())
    }
}

/// A private network endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcEndpoint {
    /// Provider id (e.g. "vpce-0123").
    pub id: String,
    /// Provider lifecycle state string.
    pub state: String,
    /// Owning VPC.
    pub vpc_id: String,
    /// Target service identifier.
    pub service_name: String,
    /// Currently attached subnets.
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    /// Currently attached security groups.
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    /// DNS names, populated once the endpoint is available.
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// Tags on the endpoint.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Interpreted endpoint lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointState {
    /// Being provisioned.
    Pending,
    /// Waiting for the service owner to accept the connection.
    PendingAcceptance,
    /// Usable; memberships can be reconciled.
    Available,
    /// Provisioning failed; needs operator intervention.
    Failed,
    /// Connection rejected by the service owner.
    Rejected,
    /// Provider-side teardown in progress.
    Deleting,
    /// Gone.
    Deleted,
    /// A state string this client does not recognize.
    Unknown(String),
}

impl EndpointState {
    /// Parse the provider's state string.
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state {
            "pending" => EndpointState::Pending,
            "pendingAcceptance" => EndpointState::PendingAcceptance,
            "available" => EndpointState::Available,
            "failed" => EndpointState::Failed,
            "rejected" => EndpointState::Rejected,
            "deleting" => EndpointState::Deleting,
            "deleted" => EndpointState::Deleted,
            other => EndpointState::Unknown(other.to_string()),
        }
    }
}

/// A VPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpc {
    /// Provider id.
    pub id: String,
    /// Tags on the VPC.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A subnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    /// Provider id.
    pub id: String,
    /// Owning VPC.
    pub vpc_id: String,
    /// Availability zone.
    pub availability_zone: String,
    /// Tags on the subnet.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A hosted zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZone {
    /// Provider id.
    pub id: String,
    /// Zone apex domain.
    pub domain_name: String,
    /// Private zones are only resolvable from the attached VPC.
    pub private: bool,
}

/// A resource record inside a hosted zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Fully qualified record name.
    pub name: String,
    /// Record type, e.g. "CNAME".
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record target.
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_state_parse() {
        assert_eq!(EndpointState::parse("available"), EndpointState::Available);
        assert_eq!(
            EndpointState::parse("pendingAcceptance"),
            EndpointState::PendingAcceptance
        );
        assert_eq!(
            EndpointState::parse("expired"),
            EndpointState::Unknown("expired".to_string())
        );
    }

    #[test]
    fn test_permission_matches_rule_exactly() {
        let perm = IpPermission {
            protocol: "tcp".to_string(),
            from_port: 443,
            to_port: 443,
            source_group_id: "sg-node".to_string(),
        };
        let rule = SecurityGroupRule {
            id: "sgr-1".to_string(),
            group_id: "sg-1".to_string(),
            is_egress: false,
            protocol: "tcp".to_string(),
            from_port: 443,
            to_port: 443,
            source_group_id: Some("sg-node".to_string()),
        };
        assert!(perm.matches(&rule));

        let mut other = rule.clone();
        other.to_port = 8443;
        assert!(!perm.matches(&other));

        let mut no_source = rule;
        no_source.source_group_id = None;
        assert!(!perm.matches(&no_source));
    }
}
