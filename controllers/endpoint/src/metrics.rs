//! Prometheus metrics for the endpoint controller.
//!
//! Two signals back the operator's alerting: endpoints stuck waiting for
//! the service owner to accept, and provider calls the token was not
//! permitted to make.

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// Controller metrics, registered once and injected into the reconciler.
#[derive(Clone)]
pub struct Metrics {
    pending_acceptance: IntGaugeVec,
    unauthorized_operations: IntCounterVec,
}

impl Metrics {
    /// Create and register the metric families.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let pending_acceptance = IntGaugeVec::new(
            Opts::new(
                "managedendpoint_pending_acceptance",
                "ManagedEndpoints whose provider endpoint is waiting for acceptance",
            ),
            &["name", "namespace", "endpoint_id"],
        )?;
        let unauthorized_operations = IntCounterVec::new(
            Opts::new(
                "cloud_unauthorized_operations_total",
                "Provider calls refused because the token lacked permission",
            ),
            &["action"],
        )?;
        registry.register(Box::new(pending_acceptance.clone()))?;
        registry.register(Box::new(unauthorized_operations.clone()))?;
        Ok(Self {
            pending_acceptance,
            unauthorized_operations,
        })
    }

    /// Mark an object's endpoint as waiting for acceptance.
    pub fn set_pending_acceptance(&self, name: &str, namespace: &str, endpoint_id: &str) {
        self.pending_acceptance
            .with_label_values(&[name, namespace, endpoint_id])
            .set(1);
    }

    /// Clear the pending-acceptance mark. Best effort: removing a label set
    /// that was never written is not an error worth surfacing.
    pub fn clear_pending_acceptance(&self, name: &str, namespace: &str, endpoint_id: &str) {
        let _ = self
            .pending_acceptance
            .remove_label_values(&[name, namespace, endpoint_id]);
    }

    /// Count a provider call refused for lack of permission.
    pub fn inc_unauthorized(&self, action: &str) {
        self.unauthorized_operations
            .with_label_values(&[action])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(registry: &Registry) -> String {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_pending_acceptance_set_and_clear() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();

        metrics.set_pending_acceptance("db", "default", "vpce-1");
        let output = render(&registry);
        assert!(output.contains("managedendpoint_pending_acceptance"));
        assert!(output.contains("endpoint_id=\"vpce-1\""));

        metrics.clear_pending_acceptance("db", "default", "vpce-1");
        assert!(!render(&registry).contains("endpoint_id=\"vpce-1\""));

        // clearing twice is harmless
        metrics.clear_pending_acceptance("db", "default", "vpce-1");
    }

    #[test]
    fn test_unauthorized_counter() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        metrics.inc_unauthorized("CreateSecurityGroup");
        metrics.inc_unauthorized("CreateSecurityGroup");

        let output = render(&registry);
        assert!(output.contains(
            "cloud_unauthorized_operations_total{action=\"CreateSecurityGroup\"} 2"
        ));
    }
}
