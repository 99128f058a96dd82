//! Cloud gateway API client.
//!
//! Talks to the internal cloud gateway, a thin REST front for the provider's
//! networking and DNS APIs. Collection search endpoints return an empty list
//! (not an error) on no match; by-id lookups return 404 for a missing
//! resource, which surfaces as `CloudError::NotFound`.

use crate::common::HttpClient;
use crate::error::CloudError;
use crate::models::*;
use crate::cloud_trait::{DnsOps, EndpointOps, NetworkOps, SecurityGroupOps, TagOps};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Cloud gateway API client.
#[derive(Debug)]
pub struct CloudGatewayClient {
    http: HttpClient,
}

impl CloudGatewayClient {
    /// Create a new gateway client.
    ///
    /// # Arguments
    /// * `base_url` - Gateway base URL (e.g. "http://cloud-gateway:8080")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CloudError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by hitting the lightweight status endpoint.
    pub async fn validate_token(&self) -> Result<(), CloudError> {
        debug!("Validating gateway token and connectivity");
        let _status: serde_json::Value = self.http.get("GetStatus", "/v1/status").await?;
        Ok(())
    }

    fn tags_json(tags: &[Tag]) -> serde_json::Value {
        json!(tags)
    }
}

#[async_trait::async_trait]
impl TagOps for CloudGatewayClient {
    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "CreateTags",
                "/v1/tags",
                &json!({ "resourceId": resource_id, "tags": Self::tags_json(tags) }),
            )
            .await
    }
}

#[async_trait::async_trait]
impl SecurityGroupOps for CloudGatewayClient {
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, CloudError> {
        self.http
            .get(
                "DescribeSecurityGroups",
                &format!("/v1/security-groups/{id}"),
            )
            .await
    }

    async fn find_security_group_by_tags(
        &self,
        tags: &[Tag],
    ) -> Result<Option<SecurityGroup>, CloudError> {
        let groups: Vec<SecurityGroup> = self
            .http
            .post(
                "DescribeSecurityGroups",
                "/v1/security-groups/search",
                &json!({ "tags": Self::tags_json(tags) }),
            )
            .await?;
        Ok(groups.into_iter().next())
    }

    async fn create_security_group(
        &self,
        name: &str,
        vpc_id: &str,
        tags: &[Tag],
    ) -> Result<SecurityGroup, CloudError> {
        self.http
            .post(
                "CreateSecurityGroup",
                "/v1/security-groups",
                &json!({ "name": name, "vpcId": vpc_id, "tags": Self::tags_json(tags) }),
            )
            .await
    }

    async fn delete_security_group(&self, id: &str) -> Result<(), CloudError> {
        self.http
            .delete(
                "DeleteSecurityGroup",
                &format!("/v1/security-groups/{id}"),
            )
            .await
    }

    async fn describe_security_group_rules(
        &self,
        group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>, CloudError> {
        self.http
            .get(
                "DescribeSecurityGroupRules",
                &format!("/v1/security-groups/{group_id}/rules"),
            )
            .await
    }

    async fn authorize_security_group_rules(
        &self,
        group_id: &str,
        egress: bool,
        permissions: &[IpPermission],
        tags: &[Tag],
    ) -> Result<(), CloudError> {
        let action = if egress {
            "AuthorizeSecurityGroupEgress"
        } else {
            "AuthorizeSecurityGroupIngress"
        };
        self.http
            .post_unit(
                action,
                &format!("/v1/security-groups/{group_id}/rules"),
                &json!({
                    "egress": egress,
                    "permissions": permissions,
                    "tags": Self::tags_json(tags),
                }),
            )
            .await
    }
}

#[async_trait::async_trait]
impl EndpointOps for CloudGatewayClient {
    async fn get_endpoint(&self, id: &str) -> Result<VpcEndpoint, CloudError> {
        self.http
            .get("DescribeVpcEndpoints", &format!("/v1/endpoints/{id}"))
            .await
    }

    async fn find_endpoint_by_tags(
        &self,
        tags: &[Tag],
    ) -> Result<Option<VpcEndpoint>, CloudError> {
        let endpoints: Vec<VpcEndpoint> = self
            .http
            .post(
                "DescribeVpcEndpoints",
                "/v1/endpoints/search",
                &json!({ "tags": Self::tags_json(tags) }),
            )
            .await?;
        Ok(endpoints.into_iter().next())
    }

    async fn create_endpoint(
        &self,
        name: &str,
        vpc_id: &str,
        service_name: &str,
        tags: &[Tag],
    ) -> Result<VpcEndpoint, CloudError> {
        self.http
            .post(
                "CreateVpcEndpoint",
                "/v1/endpoints",
                &json!({
                    "name": name,
                    "vpcId": vpc_id,
                    "serviceName": service_name,
                    "tags": Self::tags_json(tags),
                }),
            )
            .await
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), CloudError> {
        self.http
            .delete("DeleteVpcEndpoint", &format!("/v1/endpoints/{id}"))
            .await
    }

    async fn add_endpoint_subnets(
        &self,
        id: &str,
        subnet_ids: &[String],
    ) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ModifyVpcEndpoint",
                &format!("/v1/endpoints/{id}/subnets"),
                &json!({ "add": subnet_ids }),
            )
            .await
    }

    async fn remove_endpoint_subnets(
        &self,
        id: &str,
        subnet_ids: &[String],
    ) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ModifyVpcEndpoint",
                &format!("/v1/endpoints/{id}/subnets"),
                &json!({ "remove": subnet_ids }),
            )
            .await
    }

    async fn add_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ModifyVpcEndpoint",
                &format!("/v1/endpoints/{id}/security-groups"),
                &json!({ "add": group_ids }),
            )
            .await
    }

    async fn remove_endpoint_security_groups(
        &self,
        id: &str,
        group_ids: &[String],
    ) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ModifyVpcEndpoint",
                &format!("/v1/endpoints/{id}/security-groups"),
                &json!({ "remove": group_ids }),
            )
            .await
    }
}

#[async_trait::async_trait]
impl NetworkOps for CloudGatewayClient {
    async fn find_vpc_by_tag(&self, tag_key: &str) -> Result<Option<Vpc>, CloudError> {
        let vpcs: Vec<Vpc> = self
            .http
            .post(
                "DescribeVpcs",
                "/v1/vpcs/search",
                &json!({ "tagKey": tag_key }),
            )
            .await?;
        Ok(vpcs.into_iter().next())
    }

    async fn list_private_subnets(&self, cluster_tag: &str) -> Result<Vec<Subnet>, CloudError> {
        self.http
            .post(
                "DescribeSubnets",
                "/v1/subnets/search",
                &json!({ "tagKey": cluster_tag, "role": "internal-elb" }),
            )
            .await
    }

    async fn find_node_security_groups(
        &self,
        cluster_tag: &str,
    ) -> Result<Vec<SecurityGroup>, CloudError> {
        self.http
            .post(
                "DescribeSecurityGroups",
                "/v1/security-groups/search",
                &json!({ "tagKey": cluster_tag, "role": "node" }),
            )
            .await
    }
}

#[async_trait::async_trait]
impl DnsOps for CloudGatewayClient {
    async fn get_hosted_zone(&self, id: &str) -> Result<HostedZone, CloudError> {
        self.http
            .get("GetHostedZone", &format!("/v1/hosted-zones/{id}"))
            .await
    }

    async fn find_hosted_zone_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<HostedZone>, CloudError> {
        let zones: Vec<HostedZone> = self
            .http
            .post(
                "ListHostedZones",
                "/v1/hosted-zones/search",
                &json!({ "domainName": domain, "private": true }),
            )
            .await?;
        Ok(zones.into_iter().next())
    }

    async fn create_hosted_zone(
        &self,
        domain: &str,
        vpc_id: &str,
        region: &str,
    ) -> Result<HostedZone, CloudError> {
        self.http
            .post(
                "CreateHostedZone",
                "/v1/hosted-zones",
                &json!({ "domainName": domain, "vpcId": vpc_id, "region": region }),
            )
            .await
    }

    async fn delete_hosted_zone(&self, id: &str) -> Result<(), CloudError> {
        self.http
            .delete("DeleteHostedZone", &format!("/v1/hosted-zones/{id}"))
            .await
    }

    async fn upsert_record(
        &self,
        zone_id: &str,
        name: &str,
        target: &str,
    ) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ChangeResourceRecordSets",
                &format!("/v1/hosted-zones/{zone_id}/records"),
                &json!({ "action": "UPSERT", "name": name, "type": "CNAME", "value": target }),
            )
            .await
    }

    async fn delete_record(&self, zone_id: &str, name: &str) -> Result<(), CloudError> {
        self.http
            .post_unit(
                "ChangeResourceRecordSets",
                &format!("/v1/hosted-zones/{zone_id}/records"),
                &json!({ "action": "DELETE", "name": name, "type": "CNAME" }),
            )
            .await
    }
}
