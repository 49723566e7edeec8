//! reqwest-backed transport.

use super::error::TransportError;
use super::interceptor::{log_failure, RequestInterceptor};
use super::token::TokenStore;
use super::{ApiRequest, ApiResponse, Transport};
use crate::config::{ApiConfig, ConfigError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Transport performing real HTTP requests against a configured base URL.
///
/// Every request passes through the [`RequestInterceptor`] before it is sent,
/// and every failure is logged through [`log_failure`] before it is returned.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    interceptor: RequestInterceptor,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ConfigError> {
        let base_url = config.parsed_base_url()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            interceptor: RequestInterceptor::new(tokens),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves the request against the base URL and applies the interceptor.
    pub fn build_request(&self, request: &ApiRequest) -> Result<reqwest::Request, TransportError> {
        let mut url = self
            .base_url
            .join(&request.path)
            .map_err(|e| TransportError::Request(format!("{}: {e}", request.path)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        let mut http_request = self.client.request(request.method.clone(), url).build()?;
        self.interceptor.intercept(&mut http_request);
        Ok(http_request)
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let http_request = self.build_request(request)?;
        let url = http_request.url().to_string();
        debug!(method = %request.method, %url, "Sending request");

        let response = self.client.execute(http_request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let message = status.canonical_reason().unwrap_or_default().to_string();
        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        debug!(status = status.as_u16(), %url, "Response received");
        Ok(ApiResponse {
            status: status.as_u16(),
            message,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(request = %request))]
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let result = self.send(&request).await;
        if let Err(e) = &result {
            log_failure(e);
        }
        result
    }
}
