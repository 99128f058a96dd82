//! Cluster-scoped settings and resolved context.
//!
//! `ClusterSettings` is what the operator reads from the environment at
//! startup. `ClusterContext` is the resolved form, produced once per process
//! by querying the provider for the cluster's VPC. Every reconcile pass
//! borrows the same resolved context.

use crate::error::ControllerError;
use cloud_client::NetworkOps;
use tracing::info;

/// Raw operator configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Name of the Kubernetes cluster; keys the provider cluster tag.
    pub cluster_name: String,
    /// Provider region the cluster runs in.
    pub region: String,
    /// Base domain for auto-discovered private zones.
    pub base_domain: Option<String>,
    /// Skip VPC discovery and use this VPC id.
    pub vpc_override: Option<String>,
}

impl ClusterSettings {
    /// Read settings from the environment. `CLUSTER_NAME` and `REGION` are
    /// required; `BASE_DOMAIN` and `VPC_ID` are optional.
    pub fn from_env() -> Result<Self, ControllerError> {
        let cluster_name = std::env::var("CLUSTER_NAME").map_err(|_| {
            ControllerError::InvalidConfig(
                "CLUSTER_NAME environment variable is required".to_string(),
            )
        })?;
        let region = std::env::var("REGION").map_err(|_| {
            ControllerError::InvalidConfig("REGION environment variable is required".to_string())
        })?;
        Ok(Self {
            cluster_name,
            region,
            base_domain: std::env::var("BASE_DOMAIN").ok(),
            vpc_override: std::env::var("VPC_ID").ok(),
        })
    }
}

/// Resolved cluster context, computed once and shared.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    /// Cluster name.
    pub cluster_name: String,
    /// The provider tag key marking cluster-owned resources,
    /// `kubernetes.io/cluster/{name}`.
    pub cluster_tag: String,
    /// The cluster's VPC.
    pub vpc_id: String,
    /// Default region for provider calls.
    pub region: String,
    /// Base domain for auto-discovered zones.
    pub base_domain: Option<String>,
}

impl ClusterContext {
    /// Resolve the context from settings, discovering the VPC by cluster tag
    /// unless an override was configured.
    pub async fn resolve<C: NetworkOps + ?Sized>(
        settings: &ClusterSettings,
        cloud: &C,
    ) -> Result<Self, ControllerError> {
        let cluster_tag = format!("kubernetes.io/cluster/{}", settings.cluster_name);

        let vpc_id = match &settings.vpc_override {
            Some(id) => id.clone(),
            None => cloud
                .find_vpc_by_tag(&cluster_tag)
                .await?
                .map(|vpc| vpc.id)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "no VPC found carrying tag {cluster_tag}; set VPC_ID to override"
                    ))
                })?,
        };
        info!(
            cluster = %settings.cluster_name,
            vpc = %vpc_id,
            region = %settings.region,
            "Resolved cluster context"
        );

        Ok(Self {
            cluster_name: settings.cluster_name.clone(),
            cluster_tag,
            vpc_id,
            region: settings.region.clone(),
            base_domain: settings.base_domain.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_client::mock::MockCloudClient;
    use cloud_client::models::{Tag, Vpc};

    fn settings() -> ClusterSettings {
        ClusterSettings {
            cluster_name: "prod-east".to_string(),
            region: "us-east-1".to_string(),
            base_domain: Some("internal.example.com".to_string()),
            vpc_override: None,
        }
    }

    #[tokio::test]
    async fn test_resolves_vpc_by_cluster_tag() {
        let mock = MockCloudClient::new();
        mock.add_vpc(Vpc {
            id: "vpc-prod".to_string(),
            tags: vec![Tag::new("kubernetes.io/cluster/prod-east", "owned")],
        });

        let ctx = ClusterContext::resolve(&settings(), &mock).await.unwrap();
        assert_eq!(ctx.vpc_id, "vpc-prod");
        assert_eq!(ctx.cluster_tag, "kubernetes.io/cluster/prod-east");
    }

    #[tokio::test]
    async fn test_override_skips_discovery() {
        let mock = MockCloudClient::new();
        let mut s = settings();
        s.vpc_override = Some("vpc-fixed".to_string());

        let ctx = ClusterContext::resolve(&s, &mock).await.unwrap();
        assert_eq!(ctx.vpc_id, "vpc-fixed");
        assert_eq!(mock.call_count("find_vpc_by_tag"), 0);
    }

    #[tokio::test]
    async fn test_missing_vpc_is_a_config_error() {
        let mock = MockCloudClient::new();
        let err = ClusterContext::resolve(&settings(), &mock)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
