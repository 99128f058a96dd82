//! Security group reconciliation.
//!
//! Discovers or creates the managed group, then reconciles its rules. Rule
//! reconciliation is additive: desired rules missing from the group are
//! authorized, rules the controller does not recognize are left alone.
//! The source (ingress) and destination (egress) of every rule is the set
//! of node security groups, resolved read-only by cluster tag.

use crate::context::ClusterContext;
use crate::error::ControllerError;
use crate::naming::{generate_name, MAX_RESOURCE_NAME_LEN};
use crate::reconciler::discovery::{discover_or_create, TagDiscovery, TaggedResource};
use crate::reconciler::{identity_tags, required_tags, ObjectKey, Outcome};
use async_trait::async_trait;
use cloud_client::{
    CloudError, IpPermission, NetworkOps, SecurityGroupOps, SecurityGroupRule, Tag,
};
use crds::conditions::{set_condition, ConditionStatus, ConditionType};
use crds::{ManagedEndpointStatus, PortRule, SecurityGroupSpec};
use tracing::{debug, info};

struct SecurityGroupDiscovery<'a, C: SecurityGroupOps + ?Sized> {
    cloud: &'a C,
    vpc_id: &'a str,
}

#[async_trait]
impl<C: SecurityGroupOps + ?Sized> TagDiscovery for SecurityGroupDiscovery<'_, C> {
    async fn get_by_id(&self, id: &str) -> Result<TaggedResource, CloudError> {
        let group = self.cloud.get_security_group(id).await?;
        Ok(TaggedResource {
            id: group.id,
            tags: group.tags,
        })
    }

    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Option<TaggedResource>, CloudError> {
        Ok(self
            .cloud
            .find_security_group_by_tags(tags)
            .await?
            .map(|group| TaggedResource {
                id: group.id,
                tags: group.tags,
            }))
    }

    async fn create(&self, name: &str, tags: &[Tag]) -> Result<TaggedResource, CloudError> {
        let group = self.cloud.create_security_group(name, self.vpc_id, tags).await?;
        Ok(TaggedResource {
            id: group.id,
            tags: group.tags,
        })
    }

    async fn repair_tags(&self, id: &str, tags: &[Tag]) -> Result<(), CloudError> {
        self.cloud.create_tags(id, tags).await
    }
}

/// Ensure the managed security group exists and carries the desired rules.
pub async fn reconcile_security_group<C: SecurityGroupOps + NetworkOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    key: &ObjectKey,
    spec: &SecurityGroupSpec,
    status: &mut ManagedEndpointStatus,
) -> Result<Outcome, ControllerError> {
    match reconcile_inner(cloud, ctx, key, spec, status).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            set_condition(
                &mut status.conditions,
                ConditionType::SecurityGroupReady,
                ConditionStatus::False,
                "Error",
                &e.to_string(),
            );
            Err(e)
        }
    }
}

async fn reconcile_inner<C: SecurityGroupOps + NetworkOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    key: &ObjectKey,
    spec: &SecurityGroupSpec,
    status: &mut ManagedEndpointStatus,
) -> Result<Outcome, ControllerError> {
    let name = generate_name(
        &format!("{}-{}", ctx.cluster_name, key.name),
        "sg",
        MAX_RESOURCE_NAME_LEN,
    )?;
    let identity = identity_tags(ctx, key);
    let required = required_tags(&identity, &name);

    let adapter = SecurityGroupDiscovery {
        cloud,
        vpc_id: &ctx.vpc_id,
    };
    let discovered = discover_or_create(
        &adapter,
        status.security_group_id.as_deref(),
        &name,
        &identity,
        &required,
    )
    .await?;
    status.security_group_id = Some(discovered.id().to_string());

    if discovered.is_created() {
        set_condition(
            &mut status.conditions,
            ConditionType::SecurityGroupReady,
            ConditionStatus::False,
            "Provisioning",
            &format!("security group {} created", discovered.id()),
        );
        return Ok(Outcome::Created);
    }
    let group_id = discovered.id();

    let node_groups = cloud.find_node_security_groups(&ctx.cluster_tag).await?;
    if node_groups.is_empty() && !(spec.ingress_rules.is_empty() && spec.egress_rules.is_empty()) {
        return Err(ControllerError::InvalidConfig(format!(
            "no node security groups carry tag {}",
            ctx.cluster_tag
        )));
    }
    let node_group_ids: Vec<&str> = node_groups.iter().map(|g| g.id.as_str()).collect();

    let existing = cloud.describe_security_group_rules(group_id).await?;
    let missing_ingress =
        missing_permissions(&spec.ingress_rules, &node_group_ids, &existing, false);
    let missing_egress = missing_permissions(&spec.egress_rules, &node_group_ids, &existing, true);
    debug!(
        group = group_id,
        ingress = missing_ingress.len(),
        egress = missing_egress.len(),
        "Rule delta"
    );

    if !missing_ingress.is_empty() {
        cloud
            .authorize_security_group_rules(group_id, false, &missing_ingress, &identity)
            .await?;
        info!(group = group_id, count = missing_ingress.len(), "Authorized ingress rules");
    }
    if !missing_egress.is_empty() {
        cloud
            .authorize_security_group_rules(group_id, true, &missing_egress, &identity)
            .await?;
        info!(group = group_id, count = missing_egress.len(), "Authorized egress rules");
    }

    set_condition(
        &mut status.conditions,
        ConditionType::SecurityGroupReady,
        ConditionStatus::True,
        "Reconciled",
        &format!("security group {group_id} rules converged"),
    );
    Ok(Outcome::Converged)
}

/// Desired permissions (rule x node group) not matched by any existing rule
/// in the same direction.
fn missing_permissions(
    rules: &[PortRule],
    node_group_ids: &[&str],
    existing: &[SecurityGroupRule],
    egress: bool,
) -> Vec<IpPermission> {
    let existing: Vec<&SecurityGroupRule> =
        existing.iter().filter(|r| r.is_egress == egress).collect();
    let mut missing = Vec::new();
    for rule in rules {
        for node_group in node_group_ids {
            let permission = IpPermission {
                protocol: rule.protocol.clone(),
                from_port: rule.from_port,
                to_port: rule.to_port,
                source_group_id: (*node_group).to_string(),
            };
            if !existing.iter().any(|r| permission.matches(r)) {
                missing.push(permission);
            }
        }
    }
    missing
}
