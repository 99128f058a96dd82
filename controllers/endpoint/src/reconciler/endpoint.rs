//! Network endpoint reconciliation.
//!
//! Discovers or creates the endpoint, then acts on the provider's lifecycle
//! state. Membership reconciliation (subnets, security groups) only runs on
//! an available endpoint; subnets are detached before new ones are attached
//! because the provider rejects overlapping modifications in one call.

use crate::context::ClusterContext;
use crate::diff::string_set_diff;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::naming::{generate_name, MAX_RESOURCE_NAME_LEN};
use crate::reconciler::discovery::{discover_or_create, TagDiscovery, TaggedResource};
use crate::reconciler::{identity_tags, required_tags, ObjectKey, Outcome};
use async_trait::async_trait;
use cloud_client::{CloudError, EndpointOps, EndpointState, NetworkOps, Tag, VpcEndpoint};
use crds::conditions::{set_condition, ConditionStatus, ConditionType};
use crds::{ManagedEndpointStatus, NetworkSpec};
use tracing::{debug, info, warn};

struct EndpointDiscovery<'a, C: EndpointOps + ?Sized> {
    cloud: &'a C,
    vpc_id: &'a str,
    service_name: &'a str,
}

#[async_trait]
impl<C: EndpointOps + ?Sized> TagDiscovery for EndpointDiscovery<'_, C> {
    async fn get_by_id(&self, id: &str) -> Result<TaggedResource, CloudError> {
        let endpoint = self.cloud.get_endpoint(id).await?;
        Ok(TaggedResource {
            id: endpoint.id,
            tags: endpoint.tags,
        })
    }

    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Option<TaggedResource>, CloudError> {
        Ok(self
            .cloud
            .find_endpoint_by_tags(tags)
            .await?
            .map(|endpoint| TaggedResource {
                id: endpoint.id,
                tags: endpoint.tags,
            }))
    }

    async fn create(&self, name: &str, tags: &[Tag]) -> Result<TaggedResource, CloudError> {
        let endpoint = self
            .cloud
            .create_endpoint(name, self.vpc_id, self.service_name, tags)
            .await?;
        Ok(TaggedResource {
            id: endpoint.id,
            tags: endpoint.tags,
        })
    }

    async fn repair_tags(&self, id: &str, tags: &[Tag]) -> Result<(), CloudError> {
        self.cloud.create_tags(id, tags).await
    }
}

/// Ensure the endpoint exists and, once available, that its subnet and
/// security group memberships match the spec.
pub async fn reconcile_endpoint<C: EndpointOps + NetworkOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    key: &ObjectKey,
    spec: &NetworkSpec,
    service_name: &str,
    status: &mut ManagedEndpointStatus,
    metrics: &Metrics,
) -> Result<Outcome, ControllerError> {
    match reconcile_inner(cloud, ctx, key, spec, service_name, status, metrics).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // BadEndpointState already set its condition with the state
            if !matches!(e, ControllerError::BadEndpointState(_)) {
                set_condition(
                    &mut status.conditions,
                    ConditionType::EndpointReady,
                    ConditionStatus::False,
                    "Error",
                    &e.to_string(),
                );
            }
            Err(e)
        }
    }
}

async fn reconcile_inner<C: EndpointOps + NetworkOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    key: &ObjectKey,
    spec: &NetworkSpec,
    service_name: &str,
    status: &mut ManagedEndpointStatus,
    metrics: &Metrics,
) -> Result<Outcome, ControllerError> {
    let vpc_id = spec.vpc_id.as_deref().unwrap_or(&ctx.vpc_id);
    let name = generate_name(
        &format!("{}-{}", ctx.cluster_name, key.name),
        "vpce",
        MAX_RESOURCE_NAME_LEN,
    )?;
    let identity = identity_tags(ctx, key);
    let required = required_tags(&identity, &name);

    let adapter = EndpointDiscovery {
        cloud,
        vpc_id,
        service_name,
    };
    let discovered = discover_or_create(
        &adapter,
        status.endpoint_id.as_deref(),
        &name,
        &identity,
        &required,
    )
    .await?;
    status.endpoint_id = Some(discovered.id().to_string());

    if discovered.is_created() {
        set_condition(
            &mut status.conditions,
            ConditionType::EndpointReady,
            ConditionStatus::False,
            "Provisioning",
            &format!("endpoint {} created", discovered.id()),
        );
        return Ok(Outcome::Created);
    }

    let endpoint = cloud.get_endpoint(discovered.id()).await?;
    status.status = Some(endpoint.state.clone());
    let state = EndpointState::parse(&endpoint.state);

    if state == EndpointState::PendingAcceptance {
        metrics.set_pending_acceptance(&key.name, &key.namespace, &endpoint.id);
    } else {
        metrics.clear_pending_acceptance(&key.name, &key.namespace, &endpoint.id);
    }

    match state {
        EndpointState::Pending | EndpointState::PendingAcceptance => {
            info!(endpoint = %endpoint.id, state = %endpoint.state, "Endpoint not yet available");
            set_condition(
                &mut status.conditions,
                ConditionType::EndpointReady,
                ConditionStatus::False,
                "NotYetAvailable",
                &format!("endpoint is {}", endpoint.state),
            );
            Ok(Outcome::Waiting)
        }
        EndpointState::Available => {
            reconcile_memberships(cloud, ctx, spec, status, &endpoint).await?;
            set_condition(
                &mut status.conditions,
                ConditionType::EndpointReady,
                ConditionStatus::True,
                "Available",
                &format!("endpoint {} available", endpoint.id),
            );
            Ok(Outcome::Converged)
        }
        EndpointState::Failed
        | EndpointState::Rejected
        | EndpointState::Deleting
        | EndpointState::Deleted
        | EndpointState::Unknown(_) => {
            warn!(endpoint = %endpoint.id, state = %endpoint.state, "Endpoint in bad state");
            set_condition(
                &mut status.conditions,
                ConditionType::EndpointReady,
                ConditionStatus::False,
                "BadState",
                &format!("endpoint is {}", endpoint.state),
            );
            Err(ControllerError::BadEndpointState(endpoint.state))
        }
    }
}

/// Converge subnet and security group attachments on an available endpoint.
/// The two memberships are independent; neither rolls the other back.
async fn reconcile_memberships<C: EndpointOps + NetworkOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    spec: &NetworkSpec,
    status: &ManagedEndpointStatus,
    endpoint: &VpcEndpoint,
) -> Result<(), ControllerError> {
    let desired_subnets = match &spec.subnet_ids {
        Some(ids) => ids.clone(),
        None => cloud
            .list_private_subnets(&ctx.cluster_tag)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect(),
    };
    let (to_add, to_remove) = string_set_diff(&endpoint.subnet_ids, &desired_subnets);
    if !to_remove.is_empty() {
        info!(endpoint = %endpoint.id, count = to_remove.len(), "Detaching subnets");
        cloud.remove_endpoint_subnets(&endpoint.id, &to_remove).await?;
    }
    if !to_add.is_empty() {
        info!(endpoint = %endpoint.id, count = to_add.len(), "Attaching subnets");
        cloud.add_endpoint_subnets(&endpoint.id, &to_add).await?;
    }

    let desired_groups: Vec<String> = status.security_group_id.iter().cloned().collect();
    let (to_add, to_remove) = string_set_diff(&endpoint.security_group_ids, &desired_groups);
    // attach the managed group before detaching anything else so the
    // endpoint never sits without a group
    if !to_add.is_empty() {
        info!(endpoint = %endpoint.id, count = to_add.len(), "Attaching security groups");
        cloud
            .add_endpoint_security_groups(&endpoint.id, &to_add)
            .await?;
    }
    if !to_remove.is_empty() {
        info!(endpoint = %endpoint.id, count = to_remove.len(), "Detaching security groups");
        cloud
            .remove_endpoint_security_groups(&endpoint.id, &to_remove)
            .await?;
    }
    debug!(endpoint = %endpoint.id, "Memberships converged");
    Ok(())
}
