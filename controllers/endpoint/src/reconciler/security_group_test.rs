use crate::context::ClusterContext;
use crate::reconciler::security_group::reconcile_security_group;
use crate::reconciler::{ObjectKey, Outcome};
use cloud_client::mock::MockCloudClient;
use cloud_client::models::{SecurityGroup, Tag};
use crds::conditions::{find_condition, ConditionStatus, ConditionType};
use crds::{ManagedEndpointStatus, PortRule, SecurityGroupSpec};

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

fn spec() -> SecurityGroupSpec {
    SecurityGroupSpec {
        ingress_rules: vec![PortRule {
            from_port: 5432,
            to_port: 5432,
            protocol: "tcp".to_string(),
        }],
        egress_rules: Vec::new(),
    }
}

fn mock_with_node_group() -> MockCloudClient {
    let mock = MockCloudClient::new();
    mock.add_node_security_group(SecurityGroup {
        id: "sg-node".to_string(),
        vpc_id: "vpc-1".to_string(),
        name: "prod-nodes".to_string(),
        tags: vec![Tag::new("kubernetes.io/cluster/prod", "owned")],
    });
    mock
}

#[tokio::test]
async fn test_first_pass_creates_group_and_signals_created() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();

    let outcome = reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Created);
    let group_id = status.security_group_id.clone().unwrap();
    let group = mock.security_group(&group_id).unwrap();
    assert_eq!(group.vpc_id, "vpc-1");
    assert_eq!(group.name, "prod-db-sg");

    // created this pass means no rules were authorized yet
    assert_eq!(mock.call_count("authorize_ingress_rules"), 0);
    let condition = find_condition(&status.conditions, ConditionType::SecurityGroupReady).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, "Provisioning");
}

#[tokio::test]
async fn test_second_pass_authorizes_rules_and_converges() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();

    reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    let outcome = reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Converged);

    let group_id = status.security_group_id.clone().unwrap();
    let rules = mock.rules_for(&group_id);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].from_port, 5432);
    assert!(!rules[0].is_egress);
    assert_eq!(rules[0].source_group_id.as_deref(), Some("sg-node"));

    let condition = find_condition(&status.conditions, ConditionType::SecurityGroupReady).unwrap();
    assert_eq!(condition.status, ConditionStatus::True);
}

#[tokio::test]
async fn test_third_pass_is_a_no_op() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();

    for _ in 0..2 {
        reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
            .await
            .unwrap();
    }
    mock.reset_calls();

    let outcome = reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Converged);
    assert_eq!(mock.call_count("create_security_group"), 0);
    assert_eq!(mock.call_count("authorize_ingress_rules"), 0);
    assert_eq!(mock.call_count("authorize_egress_rules"), 0);
}

#[tokio::test]
async fn test_stale_group_id_rediscovers_by_tag() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();

    reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    let real_id = status.security_group_id.clone().unwrap();

    status.security_group_id = Some("sg-stale".to_string());
    mock.reset_calls();
    reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    assert_eq!(status.security_group_id.as_deref(), Some(real_id.as_str()));
    assert_eq!(mock.call_count("create_security_group"), 0);
}

#[tokio::test]
async fn test_unrecognized_rules_are_left_alone() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();

    reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    let group_id = status.security_group_id.clone().unwrap();

    // a rule somebody added out of band
    let foreign = cloud_client::IpPermission {
        protocol: "tcp".to_string(),
        from_port: 22,
        to_port: 22,
        source_group_id: "sg-bastion".to_string(),
    };
    use cloud_client::SecurityGroupOps;
    mock.authorize_security_group_rules(&group_id, false, std::slice::from_ref(&foreign), &[])
        .await
        .unwrap();

    reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap();
    let rules = mock.rules_for(&group_id);
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().any(|r| r.from_port == 22));
}

#[tokio::test]
async fn test_error_sets_condition_false() {
    let mock = mock_with_node_group();
    let mut status = ManagedEndpointStatus::default();
    mock.set_failure(
        "create_security_group",
        cloud_client::MockFailure::Unauthorized,
    );

    let err = reconcile_security_group(&mock, &ctx(), &key(), &spec(), &mut status)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("create_security_group"));

    let condition = find_condition(&status.conditions, ConditionType::SecurityGroupReady).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, "Error");
}
