use crate::context::ClusterContext;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::endpoint::reconcile_endpoint;
use crate::reconciler::{ObjectKey, Outcome};
use cloud_client::mock::MockCloudClient;
use cloud_client::models::{Subnet, Tag, VpcEndpoint};
use crds::conditions::{find_condition, ConditionStatus, ConditionType};
use crds::{ManagedEndpointStatus, NetworkSpec};
use prometheus::Registry;

fn ctx() -> ClusterContext {
    ClusterContext {
        cluster_name: "prod".to_string(),
        cluster_tag: "kubernetes.io/cluster/prod".to_string(),
        vpc_id: "vpc-1".to_string(),
        region: "us-east-1".to_string(),
        base_domain: None,
    }
}

fn key() -> ObjectKey {
    ObjectKey {
        name: "db".to_string(),
        namespace: "default".to_string(),
    }
}

fn metrics() -> Metrics {
    Metrics::new(&Registry::new()).unwrap()
}

fn seeded_endpoint(id: &str, state: &str) -> VpcEndpoint {
    VpcEndpoint {
        id: id.to_string(),
        state: state.to_string(),
        vpc_id: "vpc-1".to_string(),
        service_name: "com.provider.service.db".to_string(),
        subnet_ids: Vec::new(),
        security_group_ids: Vec::new(),
        dns_names: Vec::new(),
        tags: Vec::new(),
    }
}

async fn run(
    mock: &MockCloudClient,
    spec: &NetworkSpec,
    status: &mut ManagedEndpointStatus,
) -> Result<Outcome, ControllerError> {
    reconcile_endpoint(
        mock,
        &ctx(),
        &key(),
        spec,
        "com.provider.service.db",
        status,
        &metrics(),
    )
    .await
}

#[tokio::test]
async fn test_first_pass_creates_endpoint_and_signals_created() {
    let mock = MockCloudClient::new();
    let mut status = ManagedEndpointStatus::default();

    let outcome = run(&mock, &NetworkSpec::default(), &mut status).await.unwrap();
    assert_eq!(outcome, Outcome::Created);
    let id = status.endpoint_id.clone().unwrap();
    let endpoint = mock.endpoint(&id).unwrap();
    assert_eq!(endpoint.service_name, "com.provider.service.db");
    assert_eq!(endpoint.vpc_id, "vpc-1");
}

#[tokio::test]
async fn test_pending_states_wait() {
    for state in ["pending", "pendingAcceptance"] {
        let mock = MockCloudClient::new();
        mock.add_endpoint(seeded_endpoint("vpce-1", state));
        let mut status = ManagedEndpointStatus {
            endpoint_id: Some("vpce-1".to_string()),
            ..Default::default()
        };

        let outcome = run(&mock, &NetworkSpec::default(), &mut status).await.unwrap();
        assert_eq!(outcome, Outcome::Waiting, "state {state}");
        assert_eq!(status.status.as_deref(), Some(state));
        let condition = find_condition(&status.conditions, ConditionType::EndpointReady).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "NotYetAvailable");
        // waiting means no membership calls
        assert_eq!(mock.call_count("add_endpoint_subnets"), 0);
    }
}

#[tokio::test]
async fn test_bad_states_error() {
    for state in ["failed", "rejected", "deleting", "deleted", "somethingNew"] {
        let mock = MockCloudClient::new();
        mock.add_endpoint(seeded_endpoint("vpce-1", state));
        let mut status = ManagedEndpointStatus {
            endpoint_id: Some("vpce-1".to_string()),
            ..Default::default()
        };

        let err = run(&mock, &NetworkSpec::default(), &mut status)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ControllerError::BadEndpointState(_)),
            "state {state}"
        );
        assert_eq!(status.status.as_deref(), Some(state));
        let condition = find_condition(&status.conditions, ConditionType::EndpointReady).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "BadState");
    }
}

#[tokio::test]
async fn test_pending_acceptance_drives_gauge() {
    let mock = MockCloudClient::new();
    mock.add_endpoint(seeded_endpoint("vpce-1", "pendingAcceptance"));
    let mut status = ManagedEndpointStatus {
        endpoint_id: Some("vpce-1".to_string()),
        ..Default::default()
    };

    let registry = Registry::new();
    let metrics = Metrics::new(&registry).unwrap();
    reconcile_endpoint(
        &mock,
        &ctx(),
        &key(),
        &NetworkSpec::default(),
        "com.provider.service.db",
        &mut status,
        &metrics,
    )
    .await
    .unwrap();

    let mut buf = Vec::new();
    use prometheus::Encoder;
    prometheus::TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .unwrap();
    let output = String::from_utf8(buf).unwrap();
    assert!(output.contains("endpoint_id=\"vpce-1\""));
}

#[tokio::test]
async fn test_available_reconciles_memberships_remove_before_add() {
    let mock = MockCloudClient::new();
    let mut endpoint = seeded_endpoint("vpce-1", "available");
    endpoint.subnet_ids = vec!["subnet-old".to_string()];
    endpoint.security_group_ids = vec!["sg-default".to_string()];
    mock.add_endpoint(endpoint);

    let mut status = ManagedEndpointStatus {
        endpoint_id: Some("vpce-1".to_string()),
        security_group_id: Some("sg-managed".to_string()),
        ..Default::default()
    };
    let spec = NetworkSpec {
        vpc_id: None,
        subnet_ids: Some(vec!["subnet-a".to_string(), "subnet-b".to_string()]),
    };

    let outcome = run(&mock, &spec, &mut status).await.unwrap();
    assert_eq!(outcome, Outcome::Converged);

    let endpoint = mock.endpoint("vpce-1").unwrap();
    let mut subnets = endpoint.subnet_ids.clone();
    subnets.sort();
    assert_eq!(subnets, vec!["subnet-a", "subnet-b"]);
    assert_eq!(endpoint.security_group_ids, vec!["sg-managed"]);

    let calls = mock.calls();
    let remove_pos = calls
        .iter()
        .position(|c| c == "remove_endpoint_subnets")
        .unwrap();
    let add_pos = calls.iter().position(|c| c == "add_endpoint_subnets").unwrap();
    assert!(remove_pos < add_pos, "subnets must be detached before attach");

    let sg_add = calls
        .iter()
        .position(|c| c == "add_endpoint_security_groups")
        .unwrap();
    let sg_remove = calls
        .iter()
        .position(|c| c == "remove_endpoint_security_groups")
        .unwrap();
    assert!(sg_add < sg_remove, "managed group attaches before detach");

    let condition = find_condition(&status.conditions, ConditionType::EndpointReady).unwrap();
    assert_eq!(condition.status, ConditionStatus::True);
}

#[tokio::test]
async fn test_subnets_auto_discovered_by_cluster_tag() {
    let mock = MockCloudClient::new();
    mock.add_endpoint(seeded_endpoint("vpce-1", "available"));
    mock.add_subnet(Subnet {
        id: "subnet-private".to_string(),
        vpc_id: "vpc-1".to_string(),
        availability_zone: "us-east-1a".to_string(),
        tags: vec![
            Tag::new("kubernetes.io/cluster/prod", "owned"),
            Tag::new("kubernetes.io/role/internal-elb", "1"),
        ],
    });
    // public subnet, not eligible
    mock.add_subnet(Subnet {
        id: "subnet-public".to_string(),
        vpc_id: "vpc-1".to_string(),
        availability_zone: "us-east-1a".to_string(),
        tags: vec![Tag::new("kubernetes.io/cluster/prod", "owned")],
    });

    let mut status = ManagedEndpointStatus {
        endpoint_id: Some("vpce-1".to_string()),
        ..Default::default()
    };
    run(&mock, &NetworkSpec::default(), &mut status).await.unwrap();

    let endpoint = mock.endpoint("vpce-1").unwrap();
    assert_eq!(endpoint.subnet_ids, vec!["subnet-private"]);
}

#[tokio::test]
async fn test_converged_endpoint_is_a_no_op() {
    let mock = MockCloudClient::new();
    let mut endpoint = seeded_endpoint("vpce-1", "available");
    endpoint.subnet_ids = vec!["subnet-a".to_string()];
    endpoint.security_group_ids = vec!["sg-managed".to_string()];
    mock.add_endpoint(endpoint);

    let mut status = ManagedEndpointStatus {
        endpoint_id: Some("vpce-1".to_string()),
        security_group_id: Some("sg-managed".to_string()),
        ..Default::default()
    };
    let spec = NetworkSpec {
        vpc_id: None,
        subnet_ids: Some(vec!["subnet-a".to_string()]),
    };

    run(&mock, &spec, &mut status).await.unwrap();
    assert_eq!(mock.call_count("add_endpoint_subnets"), 0);
    assert_eq!(mock.call_count("remove_endpoint_subnets"), 0);
    assert_eq!(mock.call_count("add_endpoint_security_groups"), 0);
    assert_eq!(mock.call_count("remove_endpoint_security_groups"), 0);
}

#[tokio::test]
async fn test_multi_pass_convergence() {
    let mock = MockCloudClient::new();
    let spec = NetworkSpec {
        vpc_id: None,
        subnet_ids: Some(vec!["subnet-a".to_string()]),
    };
    let mut status = ManagedEndpointStatus {
        security_group_id: Some("sg-managed".to_string()),
        ..Default::default()
    };

    // pass 1: created, pending
    let outcome = run(&mock, &spec, &mut status).await.unwrap();
    assert_eq!(outcome, Outcome::Created);
    let id = status.endpoint_id.clone().unwrap();

    // pass 2: still pending, waiting
    let outcome = run(&mock, &spec, &mut status).await.unwrap();
    assert_eq!(outcome, Outcome::Waiting);

    // provider finishes provisioning
    mock.set_endpoint_state(&id, "available");

    // pass 3: memberships converge
    let outcome = run(&mock, &spec, &mut status).await.unwrap();
    assert_eq!(outcome, Outcome::Converged);
    let endpoint = mock.endpoint(&id).unwrap();
    assert_eq!(endpoint.subnet_ids, vec!["subnet-a"]);
    assert_eq!(endpoint.security_group_ids, vec!["sg-managed"]);
}
