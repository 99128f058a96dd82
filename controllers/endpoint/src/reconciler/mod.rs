//! Reconciliation logic for ManagedEndpoint resources.
//!
//! The driver walks the subresources strictly in dependency order, security
//! group first, then the network endpoint, then DNS and the alias service,
//! and persists the status after every step so a crash never forgets a
//! provider resource the controller already holds. Teardown walks the same
//! chain in reverse.

pub mod discovery;
pub mod dns;
pub mod endpoint;
pub mod security_group;
pub mod teardown;

#[cfg(test)]
mod endpoint_test;
#[cfg(test)]
mod security_group_test;

use crate::backoff::BackoffTracker;
use crate::context::{ClusterContext, ClusterSettings};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use cloud_client::{CloudClientTrait, CloudError, CloudGatewayClient, Tag};
use crds::conditions::{set_condition, ConditionStatus, ConditionType};
use crds::{ManagedEndpoint, ManagedEndpointStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Tag key marking resources owned by this controller.
pub const MANAGED_BY_KEY: &str = "cloudnet.dev/managed-by";
/// Tag value for [`MANAGED_BY_KEY`].
pub const MANAGED_BY_VALUE: &str = "endpoint-controller";
/// Tag key carrying the owning ManagedEndpoint, as "namespace/name".
pub const OBJECT_TAG_KEY: &str = "cloudnet.dev/managed-endpoint";
/// Display name tag key.
pub const NAME_KEY: &str = "Name";
/// Value of the cluster ownership tag on resources this controller creates.
pub const CLUSTER_TAG_VALUE: &str = "owned";

/// Field manager / finalizer identity.
pub const MANAGER: &str = "endpoint-controller";

/// Namespace/name of the object under reconciliation.
#[derive(Debug, Clone)]
pub struct ObjectKey {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
}

impl ObjectKey {
    /// Extract the key from the object. Cluster-scoped objects cannot occur;
    /// the CRD is namespaced.
    pub fn from_object(obj: &ManagedEndpoint) -> Result<Self, ControllerError> {
        let namespace = obj.namespace().ok_or_else(|| {
            ControllerError::InvalidConfig("ManagedEndpoint without a namespace".to_string())
        })?;
        Ok(Self {
            name: obj.name_any(),
            namespace,
        })
    }

    /// "namespace/name" form, used for tags and per-object bookkeeping.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Tags identifying a resource as belonging to this controller, this
/// cluster, and this object. Search uses exactly these.
#[must_use]
pub fn identity_tags(ctx: &ClusterContext, key: &ObjectKey) -> Vec<Tag> {
    vec![
        Tag::new(MANAGED_BY_KEY, MANAGED_BY_VALUE),
        Tag::new(ctx.cluster_tag.clone(), CLUSTER_TAG_VALUE),
        Tag::new(OBJECT_TAG_KEY, key.qualified()),
    ]
}

/// Identity tags plus the display name; the full set applied on create and
/// repaired on adopted resources.
#[must_use]
pub fn required_tags(identity: &[Tag], resource_name: &str) -> Vec<Tag> {
    let mut tags = identity.to_vec();
    tags.push(Tag::new(NAME_KEY, resource_name));
    tags
}

/// What a subresource step left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The subresource matches the spec.
    Converged,
    /// A provider resource was created this pass; its id is in status and
    /// the next pass converges on it. Requeued promptly.
    Created,
    /// Waiting on the provider (endpoint not yet available). Later steps
    /// are skipped until it clears.
    Waiting,
}

/// Reconciles ManagedEndpoint resources against the cloud gateway.
pub struct Reconciler {
    kube_client: Client,
    cloud: Arc<dyn CloudClientTrait>,
    gateway_url: String,
    settings: ClusterSettings,
    context: OnceCell<ClusterContext>,
    metrics: Metrics,
    backoffs: BackoffTracker,
}

impl Reconciler {
    /// Create a reconciler around a shared cloud client.
    pub fn new(
        kube_client: Client,
        cloud: Arc<dyn CloudClientTrait>,
        gateway_url: String,
        settings: ClusterSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            kube_client,
            cloud,
            gateway_url,
            settings,
            context: OnceCell::new(),
            metrics,
            backoffs: BackoffTracker::new(),
        }
    }

    /// Per-object retry backoff state.
    #[must_use]
    pub fn backoffs(&self) -> &BackoffTracker {
        &self.backoffs
    }

    /// The Kubernetes client, for building per-namespace APIs.
    #[must_use]
    pub fn kube_client(&self) -> Client {
        self.kube_client.clone()
    }

    /// Resolved cluster context, computed on first use and cached for the
    /// process lifetime. Concurrent first calls race benignly; one wins.
    pub async fn cluster_context(&self) -> Result<&ClusterContext, ControllerError> {
        self.context
            .get_or_try_init(|| ClusterContext::resolve(&self.settings, self.cloud.as_ref()))
            .await
    }

    /// The cloud client to use for this object: the shared client, or one
    /// built from the token in `credentialsSecretRef` for cross-account
    /// objects.
    async fn client_for(
        &self,
        obj: &ManagedEndpoint,
        key: &ObjectKey,
    ) -> Result<Arc<dyn CloudClientTrait>, ControllerError> {
        let Some(secret_name) = &obj.spec.credentials_secret_ref else {
            return Ok(self.cloud.clone());
        };
        let secrets: Api<Secret> = Api::namespaced(self.kube_client(), &key.namespace);
        let secret = secrets.get(secret_name).await?;
        let token = secret
            .data
            .as_ref()
            .and_then(|d| d.get("token"))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).to_string())
            .ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "secret {secret_name} has no 'token' key"
                ))
            })?;
        let client = CloudGatewayClient::new(self.gateway_url.clone(), token)
            .map_err(ControllerError::Cloud)?;
        Ok(Arc::new(client))
    }

    /// Resolve the target service identifier: explicit `serviceName` wins,
    /// else the `serviceRef` ConfigMap key.
    async fn resolve_service_name(
        &self,
        obj: &ManagedEndpoint,
        key: &ObjectKey,
    ) -> Result<String, ControllerError> {
        if let Some(name) = &obj.spec.service_name {
            return Ok(name.clone());
        }
        let Some(service_ref) = &obj.spec.service_ref else {
            return Err(ControllerError::InvalidConfig(
                "one of serviceName or serviceRef is required".to_string(),
            ));
        };
        let config_maps: Api<ConfigMap> = Api::namespaced(self.kube_client(), &key.namespace);
        let cm = config_maps.get(&service_ref.name).await?;
        let cm_key = service_ref.key.as_deref().unwrap_or("serviceName");
        cm.data
            .as_ref()
            .and_then(|d| d.get(cm_key))
            .cloned()
            .ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "ConfigMap {} has no '{cm_key}' key",
                    service_ref.name
                ))
            })
    }

    /// Merge-patch the status subresource.
    async fn persist_status(
        &self,
        key: &ObjectKey,
        status: &ManagedEndpointStatus,
    ) -> Result<(), ControllerError> {
        let api: Api<ManagedEndpoint> = Api::namespaced(self.kube_client(), &key.namespace);
        debug!(object = %key.qualified(), "Persisting status");
        api.patch_status(
            &key.name,
            &PatchParams::default(),
            &Patch::Merge(json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    /// Record side effects of a failed step before it propagates.
    fn note_error(&self, err: &ControllerError) {
        if let ControllerError::Cloud(CloudError::Unauthorized { action, message }) = err {
            warn!(%action, %message, "Provider refused operation for this token");
            self.metrics.inc_unauthorized(action);
        }
    }

    /// Drive all subresources toward the spec. Status is persisted after
    /// every step, including failed ones.
    pub async fn converge(&self, obj: &ManagedEndpoint) -> Result<Outcome, ControllerError> {
        let key = ObjectKey::from_object(obj)?;
        info!(object = %key.qualified(), "Reconciling ManagedEndpoint");

        let ctx = self.cluster_context().await?;
        let cloud = self.client_for(obj, &key).await?;
        let mut status = obj.status.clone().unwrap_or_default();

        // security group
        let result = security_group::reconcile_security_group(
            cloud.as_ref(),
            ctx,
            &key,
            &obj.spec.security_group,
            &mut status,
        )
        .await;
        self.persist_status(&key, &status).await?;
        match result {
            Ok(Outcome::Converged) => {}
            Ok(other) => return Ok(other),
            Err(e) => {
                self.note_error(&e);
                return Err(e);
            }
        }

        // network endpoint
        let service_name = self.resolve_service_name(obj, &key).await?;
        let result = endpoint::reconcile_endpoint(
            cloud.as_ref(),
            ctx,
            &key,
            &obj.spec.network,
            &service_name,
            &mut status,
            &self.metrics,
        )
        .await;
        self.persist_status(&key, &status).await?;
        match result {
            Ok(Outcome::Converged) => {}
            Ok(other) => return Ok(other),
            Err(e) => {
                self.note_error(&e);
                return Err(e);
            }
        }

        // custom DNS
        if let Some(custom_dns) = &obj.spec.custom_dns {
            let region = obj.spec.region.as_deref().unwrap_or(&ctx.region);
            let result =
                dns::reconcile_dns(cloud.as_ref(), ctx, custom_dns, region, &mut status).await;
            self.persist_status(&key, &status).await?;
            match result {
                Ok(Outcome::Converged) => {}
                Ok(other) => return Ok(other),
                Err(e) => {
                    self.note_error(&e);
                    return Err(e);
                }
            }
        }

        // alias service
        if let Some(alias_name) = &obj.spec.alias_service_name {
            let owner = obj.controller_owner_ref(&());
            let result = self
                .reconcile_alias(cloud.as_ref(), &key, alias_name, owner, &mut status)
                .await;
            self.persist_status(&key, &status).await?;
            result?;
        }

        info!(object = %key.qualified(), "ManagedEndpoint converged");
        Ok(Outcome::Converged)
    }

    /// Apply the in-cluster ExternalName Service aliasing the endpoint.
    /// The Service is owned by the ManagedEndpoint, so it is garbage
    /// collected with it and needs no teardown step.
    async fn reconcile_alias<C: cloud_client::EndpointOps + ?Sized>(
        &self,
        cloud: &C,
        key: &ObjectKey,
        alias_name: &str,
        owner: Option<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference>,
        status: &mut ManagedEndpointStatus,
    ) -> Result<(), ControllerError> {
        let target = match status.record_name.clone() {
            Some(record) => record,
            None => match dns::endpoint_dns_name(cloud, status).await {
                Ok(name) => name,
                Err(e) => {
                    set_condition(
                        &mut status.conditions,
                        ConditionType::AliasServiceReady,
                        ConditionStatus::False,
                        "Error",
                        &e.to_string(),
                    );
                    return Err(e);
                }
            },
        };

        let service = dns::build_alias_service(alias_name, &key.namespace, &target, owner);
        let services: Api<k8s_openapi::api::core::v1::Service> =
            Api::namespaced(self.kube_client(), &key.namespace);
        let apply = services
            .patch(
                alias_name,
                &PatchParams::apply(MANAGER).force(),
                &Patch::Apply(&service),
            )
            .await;
        match apply {
            Ok(_) => {
                info!(object = %key.qualified(), alias = alias_name, target = %target,
                    "Alias service applied");
                set_condition(
                    &mut status.conditions,
                    ConditionType::AliasServiceReady,
                    ConditionStatus::True,
                    "Reconciled",
                    &format!("aliases {target}"),
                );
                Ok(())
            }
            Err(e) => {
                set_condition(
                    &mut status.conditions,
                    ConditionType::AliasServiceReady,
                    ConditionStatus::False,
                    "Error",
                    &e.to_string(),
                );
                Err(e.into())
            }
        }
    }

    /// Release provider resources in reverse dependency order, persisting
    /// status after each step so a partially unwound teardown resumes where
    /// it stopped.
    pub async fn teardown(&self, obj: &ManagedEndpoint) -> Result<(), ControllerError> {
        let key = ObjectKey::from_object(obj)?;
        info!(object = %key.qualified(), "Tearing down ManagedEndpoint");

        let cloud = self.client_for(obj, &key).await?;
        let mut status = obj.status.clone().unwrap_or_default();

        // a zone is ours to delete only when the spec asked us to create it
        let zone_owned = obj
            .spec
            .custom_dns
            .as_ref()
            .is_some_and(|dns| dns.domain_name.is_some());

        let result = teardown::delete_record_step(cloud.as_ref(), &mut status).await;
        self.persist_status(&key, &status).await?;
        if let Err(e) = result {
            self.note_error(&e);
            return Err(e);
        }

        let result = teardown::delete_zone_step(cloud.as_ref(), &mut status, zone_owned).await;
        self.persist_status(&key, &status).await?;
        if let Err(e) = result {
            self.note_error(&e);
            return Err(e);
        }

        let result =
            teardown::delete_endpoint_step(cloud.as_ref(), &mut status, &self.metrics, &key).await;
        self.persist_status(&key, &status).await?;
        if let Err(e) = result {
            self.note_error(&e);
            return Err(e);
        }

        let result = teardown::delete_security_group_step(cloud.as_ref(), &mut status).await;
        self.persist_status(&key, &status).await?;
        if let Err(e) = result {
            self.note_error(&e);
            return Err(e);
        }

        info!(object = %key.qualified(), "Teardown complete");
        Ok(())
    }
}
