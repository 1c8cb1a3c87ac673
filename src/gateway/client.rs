//! Router Client
//!
//! How the gateway talks to the internal router.

use std::time::Duration;

use async_trait::async_trait;

use crate::api::{RouteRequest, RoutedResult, StrategyRequest};
use crate::error::{Error, Result};

/// Upstream router operations used by the gateway
#[async_trait]
pub trait RouterClient: Send + Sync {
    /// Switch the router's active strategy
    async fn change_strategy(&self, strategy: &str) -> Result<()>;

    /// Forward a query. Transport failures are `Error::UpstreamUnavailable`.
    async fn query(&self, request: &RouteRequest) -> Result<RoutedResult>;
}

/// Router client over HTTP
pub struct HttpRouterClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    strategy_timeout: Duration,
}

impl HttpRouterClient {
    pub fn new(base_url: &str, request_timeout: Duration, strategy_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            request_timeout,
            strategy_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl RouterClient for HttpRouterClient {
    async fn change_strategy(&self, strategy: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/strategy"))
            .timeout(self.strategy_timeout)
            .json(&StrategyRequest {
                strategy: strategy.to_string(),
            })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn query(&self, request: &RouteRequest) -> Result<RoutedResult> {
        let response = self
            .client
            .post(self.url("/query"))
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Upstream {
            status: status.as_u16(),
            body: format!("unreadable router reply: {}", e),
        })
    }
}
