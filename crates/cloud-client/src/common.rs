//! Shared HTTP plumbing for the cloud gateway client.
//!
//! Maps gateway responses onto the typed `CloudError` kinds in one place.

use crate::error::CloudError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Error body returned by the gateway.
#[derive(Debug, Deserialize)]
struct GatewayError {
    code: Option<String>,
    message: Option<String>,
}

/// HTTP client wrapper with token authentication.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper.
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Classify a non-success gateway response. The gateway encodes the
    /// provider error code in the body; HTTP status is the fallback.
    async fn classify(action: &str, response: reqwest::Response) -> CloudError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<GatewayError> = serde_json::from_str(&body).ok();
        let code = parsed
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .unwrap_or("");
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or(body);

        match (code, status) {
            ("DependencyViolation", _) | (_, StatusCode::CONFLICT) => {
                CloudError::DependencyViolation(message)
            }
            ("UnauthorizedOperation", _) | (_, StatusCode::FORBIDDEN) => CloudError::Unauthorized {
                action: action.to_string(),
                message,
            },
            ("RequestLimitExceeded", _) | (_, StatusCode::TOO_MANY_REQUESTS) => {
                CloudError::RateLimited(message)
            }
            (_, StatusCode::UNAUTHORIZED) => CloudError::Authentication(message),
            (_, StatusCode::NOT_FOUND) => CloudError::NotFound(format!("{action}: {message}")),
            (_, StatusCode::BAD_REQUEST) => CloudError::InvalidRequest(message),
            _ => CloudError::Api(format!("{action} failed: {status} - {message}")),
        }
    }

    /// GET a resource by path.
    pub async fn get<T: DeserializeOwned>(&self, action: &str, path: &str) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CloudError::Http)?;

        if !response.status().is_success() {
            return Err(Self::classify(action, response).await);
        }
        response.json().await.map_err(CloudError::Http)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post<T: DeserializeOwned>(
        &self,
        action: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(CloudError::Http)?;

        if !response.status().is_success() {
            return Err(Self::classify(action, response).await);
        }
        response.json().await.map_err(CloudError::Http)
    }

    /// POST a JSON body, discarding the response body.
    pub async fn post_unit(
        &self,
        action: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(CloudError::Http)?;

        if !response.status().is_success() {
            return Err(Self::classify(action, response).await);
        }
        Ok(())
    }

    /// DELETE a resource by path.
    pub async fn delete(&self, action: &str, path: &str) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(CloudError::Http)?;

        if !response.status().is_success() {
            return Err(Self::classify(action, response).await);
        }
        Ok(())
    }
}
