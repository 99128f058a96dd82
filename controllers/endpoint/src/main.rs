//! Endpoint Controller
//!
//! Converges ManagedEndpoint resources onto cloud provider state: a managed
//! security group, a private network endpoint, an optional private hosted
//! zone and record, and an optional in-cluster alias service.

mod backoff;
mod context;
mod controller;
mod diff;
mod error;
mod metrics;
mod naming;
mod reconciler;

use crate::context::ClusterSettings;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use cloud_client::CloudGatewayClient;
use kube::Client;
use std::env;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Endpoint Controller");

    // Load configuration from environment variables
    let gateway_url =
        env::var("CLOUD_GATEWAY_URL").unwrap_or_else(|_| "http://cloud-gateway:8080".to_string());
    let gateway_token = env::var("CLOUD_GATEWAY_TOKEN").map_err(|_| {
        ControllerError::InvalidConfig(
            "CLOUD_GATEWAY_TOKEN environment variable is required".to_string(),
        )
    })?;
    let settings = ClusterSettings::from_env()?;
    let namespace = env::var("WATCH_NAMESPACE").ok();

    info!("Configuration:");
    info!("  Gateway URL: {}", gateway_url);
    info!("  Cluster: {}", settings.cluster_name);
    info!("  Region: {}", settings.region);
    info!(
        "  Base domain: {}",
        settings.base_domain.as_deref().unwrap_or("none")
    );
    info!(
        "  Namespace: {}",
        namespace.as_deref().unwrap_or("all namespaces")
    );

    // Create clients
    let kube_client = Client::try_default().await?;
    let cloud_client = CloudGatewayClient::new(gateway_url.clone(), gateway_token)?;

    // Validate token and connectivity before proceeding
    info!("Validating gateway token and connectivity...");
    cloud_client.validate_token().await.map_err(|e| {
        error!("Failed to validate gateway token: {}", e);
        error!("Please ensure:");
        error!("  1. CLOUD_GATEWAY_TOKEN environment variable is set correctly");
        error!("  2. The token is valid for this gateway");
        error!("  3. The gateway is reachable at {}", gateway_url);
        ControllerError::Cloud(e)
    })?;
    info!("Gateway token validated and connectivity established");

    let registry = prometheus::Registry::new();
    let metrics = Metrics::new(&registry).map_err(|e| {
        ControllerError::InvalidConfig(format!("failed to register metrics: {e}"))
    })?;

    let reconciler = Arc::new(Reconciler::new(
        kube_client,
        Arc::new(cloud_client),
        gateway_url,
        settings,
        metrics,
    ));

    controller::run(reconciler, namespace).await
}
