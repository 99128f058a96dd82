//! Mock cloud client for unit testing.
//!
//! Stores resources in memory behind the same capability traits as the real
//! gateway client. Every call is appended to a call log so tests can assert
//! ordering and idempotence (e.g. "zero create calls on the second pass").
//! Individual operations can be made to fail with a chosen error kind.

use crate::error::CloudError;
use crate::models::*;
use crate::cloud_trait::{DnsOps, EndpointOps, NetworkOps, SecurityGroupOps, TagOps};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Error kind to inject for a mocked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Resource missing by id.
    NotFound,
    /// Delete refused by a still-attached dependent.
    DependencyViolation,
    /// Token not permitted to perform the action.
    Unauthorized,
    /// Generic provider error.
    Api,
}

impl MockFailure {
    fn to_error(self, op: &str) -> CloudError {
        match self {
            MockFailure::NotFound => CloudError::NotFound(format!("{op}: not found")),
            MockFailure::DependencyViolation => {
                CloudError::DependencyViolation(format!("{op}: resource has a dependent object"))
            }
            MockFailure::Unauthorized => CloudError::Unauthorized {
                action: op.to_string(),
                message: "not authorized".to_string(),
            },
            MockFailure::Api => CloudError::Api(format!("{op}: injected failure")),
        }
    }
}

fn has_all_tags(tags: &[Tag], required: &[Tag]) -> bool {
    required.iter().all(|r| tags.contains(r))
}

/// In-memory mock of the cloud gateway.
#[derive(Clone, Default)]
pub struct MockCloudClient {
    security_groups: Arc<Mutex<HashMap<String, SecurityGroup>>>,
    rules: Arc<Mutex<Vec<SecurityGroupRule>>>,
    endpoints: Arc<Mutex<HashMap<String, VpcEndpoint>>>,
    zones: Arc<Mutex<HashMap<String, HostedZone>>>,
    records: Arc<Mutex<HashMap<(String, String), ResourceRecord>>>,
    vpcs: Arc<Mutex<Vec<Vpc>>>,
    subnets: Arc<Mutex<Vec<Subnet>>>,
    node_groups: Arc<Mutex<Vec<SecurityGroup>>>,
    /// State assigned to newly created endpoints.
    default_endpoint_state: Arc<Mutex<String>>,
    failures: Arc<Mutex<HashMap<String, MockFailure>>>,
    calls: Arc<Mutex<Vec<String>>>,
    next_id: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCloudClient").finish_non_exhaustive()
    }
}

impl MockCloudClient {
    /// Create an empty mock.
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.default_endpoint_state.lock().unwrap() = "pending".to_string();
        mock
    }

    fn record_call(&self, op: &str) -> Result<(), CloudError> {
        self.calls.lock().unwrap().push(op.to_string());
        if let Some(failure) = self.failures.lock().unwrap().get(op) {
            return Err(failure.to_error(op));
        }
        Ok(())
    }

    fn gen_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{prefix}-{:04}", *next)
    }

    /// The ordered log of operations invoked so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations of one operation.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    /// Forget recorded calls (between test passes).
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make `op` fail with the given kind until cleared.
    pub fn set_failure(&self, op: &str, failure: MockFailure) {
        self.failures.lock().unwrap().insert(op.to_string(), failure);
    }

    /// Stop failing `op`.
    pub fn clear_failure(&self, op: &str) {
        self.failures.lock().unwrap().remove(op);
    }

    /// Seed a VPC.
    pub fn add_vpc(&self, vpc: Vpc) {
        self.vpcs.lock().unwrap().push(vpc);
    }

    /// Seed a subnet.
    pub fn add_subnet(&self, subnet: Subnet) {
        self.subnets.lock().unwrap().push(subnet);
    }

    /// Seed a node security group (read-only cluster resource).
    pub fn add_node_security_group(&self, group: SecurityGroup) {
        self.node_groups.lock().unwrap().push(group);
    }

    /// Seed a security group.
    pub fn add_security_group(&self, group: SecurityGroup) {
        self.security_groups
            .lock()
            .unwrap()
            .insert(group.id.clone(), group);
    }

    /// Seed an endpoint.
    pub fn add_endpoint(&self, endpoint: VpcEndpoint) {
        self.endpoints
            .lock()
            .unwrap()
            .insert(endpoint.id.clone(), endpoint);
    }

    /// Seed a hosted zone.
    pub fn add_hosted_zone(&self, zone: HostedZone) {
        self.zones.lock().unwrap().insert(zone.id.clone(), zone);
    }

    /// Override the state reported for an endpoint.
    pub fn set_endpoint_state(&self, id: &str, state: &str) {
        if let Some(ep) = self.endpoints.lock().unwrap().get_mut(id) {
            ep.state = state.to_string();
        }
    }

    /// Set the DNS names reported for an endpoint.
    pub fn set_endpoint_dns_names(&self, id: &str, names: &[&str]) {
        if let Some(ep) = self.endpoints.lock().unwrap().get_mut(id) {
            ep.dns_names = names.iter().map(|n| (*n).to_string()).collect();
        }
    }

    /// State assigned to endpoints created through the mock.
    pub fn set_default_endpoint_state(&self, state: &str) {
        *self.default_endpoint_state.lock().unwrap() = state.to_string();
    }

    /// Inspect a stored endpoint.
    pub fn endpoint(&self, id: &str) -> Option<VpcEndpoint> {
        self.endpoints.lock().unwrap().get(id).cloned()
    }

    /// Inspect a stored security group.
    pub fn security_group(&self, id: &str) -> Option<SecurityGroup> {
        self.security_groups.lock().unwrap().get(id).cloned()
    }

    /// Rules currently stored for a group.
    pub fn rules_for(&self, group_id: &str) -> Vec<SecurityGroupRule> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect()
    }

    /// Inspect a stored record.
    pub fn dns_record(&self, zone_id: &str, name: &str) -> Option<ResourceRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Whether a zone still exists.
    pub fn hosted_zone(&self, id: &str) -> Option<HostedZone> {
        self.zones.lock().unwrap().get(id).cloned()
    }
}

#[async_trait::async_trait]
impl TagOps for MockCloudClient {
    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), CloudError> {
        self.record_call("create_tags")?;
        let apply = |existing: &mut Vec<Tag>| {
            for tag in tags {
                if let Some(slot) = existing.iter_mut().find(|t| t.key == tag.key) {
                    slot.value = tag.value.clone();
                } else {
                    existing.push(tag.clone());
                }
            }
        };
        if let Some(group) = self.security_groups.lock().unwrap().get_mut(resource_id) {
            apply(&mut group.tags);
            return Ok(());
        }
        if let Some(ep) = self.endpoints.lock().unwrap().get_mut(resource_id) {
            apply(&mut ep.tags);
            return Ok(());
        }
        Err(CloudError::NotFound(format!(
            "create_tags: no resource {resource_id}"
        )))
    }
}

#[async_trait::async_trait]
impl SecurityGroupOps for MockCloudClient {
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, CloudError> {
        self.record_call("get_security_group")?;
        self.security_groups
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("security group {id}")))
    }

    async fn find_security_group_by_tags(
        &self,
        tags: &[Tag],
    ) -> Result<Option<SecurityGroup>, CloudError> {
        self.record_call("find_security_group_by_tags")?;
        Ok(self
            .security_groups
            .lock()
            .unwrap()
            .values()
            .find(|g| has_all_tags(&g.tags, tags))
            .cloned())
    }

    async fn create_security_group(
        &self,
        name: &str,
        vpc_id: &str,
        tags: &[Tag],
    ) -> Result<SecurityGroup, CloudError> {
        self.record_call("create_security_group")?;
        let group = SecurityGroup {
            id: self.gen_id("sg"),
            vpc_id: vpc_id.to_string(),
            name: name.to_string(),
            tags: tags.to_vec(),
        };
        self.security_groups
            .lock()
            .unwrap()
            .insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn delete_security_group(&self, id: &str) -> Result<(), CloudError> {
        self.record_call("delete_security_group")?;
        self.security_groups
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("security group {id}")))
    }

    async fn describe_security_group_rules(
        &self,
        group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>, CloudError> {
        self.record_call("describe_security_group_rules")?;
        Ok(self.rules_for(group_id))
    }

    async fn authorize_security_group_rules(
        &self,
        group_id: &str,
        egress: bool,
        permissions: &[IpPermission],
        _tags: &[Tag],
    ) -> Result<(), CloudError> {
        let op = if egress {
            "authorize_egress_rules"
        } else {
            "authorize_ingress_rules"
        };
        self.record_call(op)?;
        let mut rules = self.rules.lock().unwrap();
        for perm in permissions {
            rules.push(SecurityGroupRule {
                id: self.gen_id("sgr"),
                group_id: group_id.to_string(),
                is_egress: egress,
                protocol: perm.protocol.clone(),
                from_port: perm.from_port,
                to_port: perm.to_port,
                source_group_id: Some(perm.source_group_id.clone()),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EndpointOps for MockCloudClient {
    async fn get_endpoint(&self, id: &str) -> Result<VpcEndpoint, CloudError> {
        self.record_call("get_endpoint")?;
        self.endpoints
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))
    }

    async fn find_endpoint_by_tags(
        &self,
        tags: &[Tag],
    ) -> Result<Option<VpcEndpoint>, CloudError> {
        self.record_call("find_endpoint_by_tags")?;
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .values()
            .find(|e| has_all_tags(&e.tags, tags))
            .cloned())
    }

    async fn create_endpoint(
        &self,
        _name: &str,
        vpc_id: &str,
        service_name: &str,
        tags: &[Tag],
    ) -> Result<VpcEndpoint, CloudError> {
        self.record_call("create_endpoint")?;
        let endpoint = VpcEndpoint {
            id: self.gen_id("vpce"),
            state: self.default_endpoint_state.lock().unwrap().clone(),
            vpc_id: vpc_id.to_string(),
            service_name: service_name.to_string(),
            subnet_ids: Vec::new(),
            security_group_ids: Vec::new(),
            dns_names: Vec::new(),
            tags: tags.to_vec(),
        };
        self.endpoints
            .lock()
            .unwrap()
            .insert(endpoint.id.clone(), endpoint.clone());
        Ok(endpoint)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), CloudError> {
        self.record_call("delete_endpoint")?;
        self.endpoints
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))
    }

    async fn add_endpoint_subnets(
        &self,
        id: &str,
        subnet_ids: &[String],
    ) -> Result<(), CloudError> {
        self.record_call("add_endpoint_subnets")?;
        let mut endpoints = self.endpoints.lock().unwrap();
        let ep = endpoints
            .get_mut(id)
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))?;
        for subnet in subnet_ids {
            if !ep.subnet_ids.contains(subnet) {
                ep.subnet_ids.push(subnet.clone());
            }
        }
        Ok(())
    }

    async fn remove_endpoint_subnets(
        &self,
        id: &str,
        subnet_ids: &[String],
    ) -> Result<(), CloudError> {
        self.record_call("remove_endpoint_subnets")?;
        let mut endpoints = self.endpoints.lock().unwrap();
        let ep = endpoints
            .get_mut(id)
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))?;
        ep.subnet_ids.retain(|s| !subnet_ids.contains(s));
        Ok(())
    }

    async fn add_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError> {
        self.record_call("add_endpoint_security_groups")?;
        let mut endpoints = self.endpoints.lock().unwrap();
        let ep = endpoints
            .get_mut(id)
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))?;
        for group in group_ids {
            if !ep.security_group_ids.contains(group) {
                ep.security_group_ids.push(group.clone());
            }
        }
        Ok(())
    }

    async fn remove_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError> {
        self.record_call("remove_endpoint_security_groups")?;
        let mut endpoints = self.endpoints.lock().unwrap();
        let ep = endpoints
            .get_mut(id)
            .ok_or_else(|| CloudError::NotFound(format!("endpoint {id}")))?;
        ep.security_group_ids.retain(|g| !group_ids.contains(g));
        Ok(())
    }
}

#[async_trait::async_trait]
impl NetworkOps for MockCloudClient {
    async fn find_vpc_by_tag(&self, tag_key: &str) -> Result<Option<Vpc>, CloudError> {
        self.record_call("find_vpc_by_tag")?;
        Ok(self
            .vpcs
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.tags.iter().any(|t| t.key == tag_key))
            .cloned())
    }

    async fn list_private_subnets(&self, cluster_tag: &str) -> Result<Vec<Subnet>, CloudError> {
        self.record_call("list_private_subnets")?;
        Ok(self
            .subnets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                s.tags.iter().any(|t| t.key == cluster_tag)
                    && s.tags.iter().any(|t| t.key == "kubernetes.io/role/internal-elb")
            })
            .cloned()
            .collect())
    }

    async fn find_node_security_groups(
        &self,
        cluster_tag: &str,
    ) -> Result<Vec<SecurityGroup>, CloudError> {
        self.record_call("find_node_security_groups")?;
        Ok(self
            .node_groups
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.tags.iter().any(|t| t.key == cluster_tag))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl DnsOps for MockCloudClient {
    async fn get_hosted_zone(&self, id: &str) -> Result<HostedZone, CloudError> {
        self.record_call("get_hosted_zone")?;
        self.zones
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("hosted zone {id}")))
    }

    async fn find_hosted_zone_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<HostedZone>, CloudError> {
        self.record_call("find_hosted_zone_by_domain")?;
        Ok(self
            .zones
            .lock()
            .unwrap()
            .values()
            .find(|z| z.domain_name == domain && z.private)
            .cloned())
    }

    async fn create_hosted_zone(
        &self,
        domain: &str,
        _vpc_id: &str,
        _region: &str,
    ) -> Result<HostedZone, CloudError> {
        self.record_call("create_hosted_zone")?;
        let zone = HostedZone {
            id: self.gen_id("Z"),
            domain_name: domain.to_string(),
            private: true,
        };
        self.zones.lock().unwrap().insert(zone.id.clone(), zone.clone());
        Ok(zone)
    }

    async fn delete_hosted_zone(&self, id: &str) -> Result<(), CloudError> {
        self.record_call("delete_hosted_zone")?;
        self.zones
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("hosted zone {id}")))
    }

    async fn upsert_record(
        &self,
        zone_id: &str,
        name: &str,
        target: &str,
    ) -> Result<(), CloudError> {
        self.record_call("upsert_record")?;
        if !self.zones.lock().unwrap().contains_key(zone_id) {
            return Err(CloudError::NotFound(format!("hosted zone {zone_id}")));
        }
        self.records.lock().unwrap().insert(
            (zone_id.to_string(), name.to_string()),
            ResourceRecord {
                name: name.to_string(),
                record_type: "CNAME".to_string(),
                value: target.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, name: &str) -> Result<(), CloudError> {
        self.record_call("delete_record")?;
        self.records
            .lock()
            .unwrap()
            .remove(&(zone_id.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("record {name} in zone {zone_id}")))
    }
}
