//! HTTP transport for signed platform calls.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::envelope::{self, ApiResponse};
use crate::error::{ApiError, ApiResult};
use crate::request::{ActionRequest, HttpMethod};
use crate::sign;

/// One authenticated remote procedure call.
///
/// The seam between orchestration and the network: production code uses
/// [`ApiClient`], tests substitute a recording mock. Implementations are
/// not idempotent - retry policy belongs to callers, which know which
/// remote operations are safe to repeat.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Sign and send one request, returning the parsed envelope payload or
    /// a classified failure.
    async fn call(&self, request: ActionRequest) -> ApiResult<ApiResponse>;
}

/// Signed HTTP client for the platform API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoint_root: String,
}

impl ApiClient {
    /// Build a client for the given credentials and endpoint root.
    ///
    /// Honours the credentials' forward proxy when one is configured.
    pub fn new(
        credentials: Credentials,
        endpoint_root: impl Into<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);

        if let Some(proxy) = credentials.proxy() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ApiError::validation("InvalidParameter.Proxy", e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(ApiError::from)?;

        Ok(Self {
            http,
            credentials,
            endpoint_root: endpoint_root.into(),
        })
    }

    async fn send(&self, request: &ActionRequest) -> ApiResult<ApiResponse> {
        // Fresh wall-clock time per call; a retried operation re-signs.
        let timestamp = chrono::Utc::now().timestamp();
        let nonce: u64 = rand::random();
        let signed = sign::sign(
            request,
            &self.credentials,
            &self.endpoint_root,
            timestamp,
            nonce,
        )?;

        let host = request.host(&self.endpoint_root);
        debug!(
            action = %request.action,
            service = %request.service,
            host = %host,
            "sending platform request"
        );

        let builder = match request.method {
            HttpMethod::Post => self
                .http
                .post(format!("https://{host}/"))
                .body(request.body()?),
            HttpMethod::Get => self
                .http
                .get(format!("https://{host}/?{}", request.canonical_query())),
        };

        let mut builder = builder
            .header("Content-Type", request.method.content_type())
            .header("Authorization", &signed.authorization)
            .header("X-Api-Action", &request.action)
            .header("X-Api-Version", &request.api_version)
            .header("X-Api-Timestamp", signed.timestamp.to_string())
            .header("X-Api-Nonce", signed.nonce.to_string());

        if let Some(region) = &request.region {
            builder = builder.header("X-Api-Region", region);
        }
        if let Some(token) = self.credentials.token() {
            builder = builder.header("X-Api-Token", token);
        }

        let response = builder.send().await.map_err(ApiError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiError::from)?;

        if status.is_server_error() {
            warn!(action = %request.action, status = %status, "platform returned server error");
            return Err(ApiError::transient(format!(
                "server error {status} for {}",
                request.action
            )));
        }

        envelope::parse(&body)
    }
}

#[async_trait]
impl CloudApi for ApiClient {
    async fn call(&self, request: ActionRequest) -> ApiResult<ApiResponse> {
        self.send(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_with_proxy() {
        let credentials =
            Credentials::new("id", "key").with_proxy("http://127.0.0.1:8899");
        let client = ApiClient::new(credentials, "stratusapi.com", Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn invalid_proxy_is_a_validation_error() {
        let credentials = Credentials::new("id", "key").with_proxy("::not a url::");
        let err = ApiClient::new(credentials, "stratusapi.com", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
