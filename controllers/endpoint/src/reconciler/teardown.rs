//! Teardown steps, run in reverse dependency order.
//!
//! Each step is gated on status still referencing its resource, clears the
//! reference once the provider confirms the delete, and flips the matching
//! condition to False/"Deleted". `NotFound` counts as already deleted. The
//! driver persists status between steps and aborts at the first failure,
//! so a half-finished teardown resumes exactly where it stopped.

use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::ObjectKey;
use cloud_client::{CloudError, DnsOps, EndpointOps, SecurityGroupOps};
use crds::conditions::{set_condition, ConditionStatus, ConditionType};
use crds::ManagedEndpointStatus;
use tracing::{info, warn};

fn already_gone(result: Result<(), CloudError>) -> Result<(), ControllerError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            warn!("Resource already gone during teardown");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete the DNS record, if status holds one.
pub async fn delete_record_step<C: DnsOps + ?Sized>(
    cloud: &C,
    status: &mut ManagedEndpointStatus,
) -> Result<(), ControllerError> {
    let (Some(zone_id), Some(record_name)) = (&status.hosted_zone_id, &status.record_name) else {
        return Ok(());
    };
    already_gone(cloud.delete_record(zone_id, record_name).await)?;
    info!(zone = %zone_id, record = %record_name, "Record deleted");
    status.record_name = None;
    set_condition(
        &mut status.conditions,
        ConditionType::CustomDnsReady,
        ConditionStatus::False,
        "Deleted",
        "record removed",
    );
    Ok(())
}

/// Delete the hosted zone, but only when this controller created it.
pub async fn delete_zone_step<C: DnsOps + ?Sized>(
    cloud: &C,
    status: &mut ManagedEndpointStatus,
    zone_owned: bool,
) -> Result<(), ControllerError> {
    let Some(zone_id) = &status.hosted_zone_id else {
        return Ok(());
    };
    if !zone_owned {
        status.hosted_zone_id = None;
        return Ok(());
    }
    already_gone(cloud.delete_hosted_zone(zone_id).await)?;
    info!(zone = %zone_id, "Hosted zone deleted");
    status.hosted_zone_id = None;
    Ok(())
}

/// Delete the network endpoint.
pub async fn delete_endpoint_step<C: EndpointOps + ?Sized>(
    cloud: &C,
    status: &mut ManagedEndpointStatus,
    metrics: &Metrics,
    key: &ObjectKey,
) -> Result<(), ControllerError> {
    let Some(endpoint_id) = status.endpoint_id.clone() else {
        return Ok(());
    };
    metrics.clear_pending_acceptance(&key.name, &key.namespace, &endpoint_id);
    already_gone(cloud.delete_endpoint(&endpoint_id).await)?;
    info!(endpoint = %endpoint_id, "Endpoint deleted");
    status.status = Some("deleting".to_string());
    status.endpoint_id = None;
    set_condition(
        &mut status.conditions,
        ConditionType::EndpointReady,
        ConditionStatus::False,
        "Deleted",
        "endpoint removed",
    );
    Ok(())
}

/// Delete the managed security group. `DependencyViolation` propagates; the
/// provider is still detaching the endpoint and the driver requeues.
pub async fn delete_security_group_step<C: SecurityGroupOps + ?Sized>(
    cloud: &C,
    status: &mut ManagedEndpointStatus,
) -> Result<(), ControllerError> {
    let Some(group_id) = status.security_group_id.clone() else {
        return Ok(());
    };
    already_gone(cloud.delete_security_group(&group_id).await)?;
    info!(group = %group_id, "Security group deleted");
    status.security_group_id = None;
    set_condition(
        &mut status.conditions,
        ConditionType::SecurityGroupReady,
        ConditionStatus::False,
        "Deleted",
        "security group removed",
    );
    Ok(())
}
