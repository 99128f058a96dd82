//! Private DNS reconciliation.
//!
//! Resolves the hosted zone (explicit id, explicit domain, or the cluster's
//! base domain), then upserts the record pointing at the endpoint's DNS
//! name. Upsert replaces in place, so a retargeted endpoint converges
//! without a delete first. A zone the spec asked this controller to create
//! is the only zone teardown will delete again.

use crate::context::ClusterContext;
use crate::error::ControllerError;
use crate::reconciler::Outcome;
use cloud_client::{DnsOps, EndpointOps, HostedZone};
use crds::conditions::{set_condition, ConditionStatus, ConditionType};
use crds::{CustomDnsSpec, ManagedEndpointStatus};
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use tracing::info;

/// Ensure the hosted zone and record exist per the spec.
pub async fn reconcile_dns<C: DnsOps + EndpointOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    spec: &CustomDnsSpec,
    region: &str,
    status: &mut ManagedEndpointStatus,
) -> Result<Outcome, ControllerError> {
    match reconcile_inner(cloud, ctx, spec, region, status).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            set_condition(
                &mut status.conditions,
                ConditionType::CustomDnsReady,
                ConditionStatus::False,
                "Error",
                &e.to_string(),
            );
            Err(e)
        }
    }
}

async fn reconcile_inner<C: DnsOps + EndpointOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    spec: &CustomDnsSpec,
    region: &str,
    status: &mut ManagedEndpointStatus,
) -> Result<Outcome, ControllerError> {
    let zone = resolve_zone(cloud, ctx, spec, region).await?;
    status.hosted_zone_id = Some(zone.id.clone());

    if let Some(record) = &spec.record {
        let fqdn = format!("{}.{}", record.hostname, zone.domain_name);
        let target = endpoint_dns_name(cloud, status).await?;
        cloud.upsert_record(&zone.id, &fqdn, &target).await?;
        info!(zone = %zone.id, record = %fqdn, target = %target, "Record upserted");
        status.record_name = Some(fqdn.clone());
        set_condition(
            &mut status.conditions,
            ConditionType::CustomDnsReady,
            ConditionStatus::True,
            "Reconciled",
            &format!("{fqdn} points at {target}"),
        );
    } else {
        set_condition(
            &mut status.conditions,
            ConditionType::CustomDnsReady,
            ConditionStatus::True,
            "Reconciled",
            &format!("hosted zone {} in place", zone.id),
        );
    }
    Ok(Outcome::Converged)
}

async fn resolve_zone<C: DnsOps + ?Sized>(
    cloud: &C,
    ctx: &ClusterContext,
    spec: &CustomDnsSpec,
    region: &str,
) -> Result<HostedZone, ControllerError> {
    if let Some(zone_id) = &spec.hosted_zone_id {
        return Ok(cloud.get_hosted_zone(zone_id).await?);
    }
    if let Some(domain) = &spec.domain_name {
        if let Some(zone) = cloud.find_hosted_zone_by_domain(domain).await? {
            return Ok(zone);
        }
        let zone = cloud.create_hosted_zone(domain, &ctx.vpc_id, region).await?;
        info!(zone = %zone.id, domain, "Created private hosted zone");
        return Ok(zone);
    }
    if spec.auto_discover {
        let base_domain = ctx.base_domain.as_deref().ok_or_else(|| {
            ControllerError::InvalidConfig(
                "customDns.autoDiscover requires BASE_DOMAIN to be configured".to_string(),
            )
        })?;
        return cloud
            .find_hosted_zone_by_domain(base_domain)
            .await?
            .ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "no private hosted zone found for base domain {base_domain}"
                ))
            });
    }
    Err(ControllerError::InvalidConfig(
        "customDns requires one of hostedZoneId, domainName or autoDiscover".to_string(),
    ))
}

/// The endpoint's first provider DNS name. Absent until the endpoint is
/// available.
pub async fn endpoint_dns_name<C: EndpointOps + ?Sized>(
    cloud: &C,
    status: &ManagedEndpointStatus,
) -> Result<String, ControllerError> {
    let endpoint_id = status.endpoint_id.as_deref().ok_or_else(|| {
        ControllerError::InvalidConfig("no endpoint recorded in status".to_string())
    })?;
    let endpoint = cloud.get_endpoint(endpoint_id).await?;
    endpoint
        .dns_names
        .first()
        .cloned()
        .ok_or(ControllerError::NoEndpointDns)
}

/// Build the in-cluster ExternalName Service aliasing `target`. The owner
/// reference ties the Service to its ManagedEndpoint so garbage collection
/// removes it when the owner is deleted.
#[must_use]
pub fn build_alias_service(
    name: &str,
    namespace: &str,
    target: &str,
    owner: Option<OwnerReference>,
) -> Service {
    let labels = BTreeMap::from([(
        "app.kubernetes.io/managed-by".to_string(),
        crate::reconciler::MANAGER.to_string(),
    )]);
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ExternalName".to_string()),
            external_name: Some(target.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
