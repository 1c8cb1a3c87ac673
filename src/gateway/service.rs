//! Gatekeeper
//!
//! Authenticate -> validate -> (optionally) switch strategy -> forward.

use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use super::auth::ApiKeyAuth;
use super::client::{HttpRouterClient, RouterClient};
use super::validate::QueryValidator;
use crate::api::{GatewayHealth, QueryRequest, QueryResponse, RouteRequest};
use crate::config::ReplGateConfig;
use crate::error::{Error, Result};
use crate::strategy::StrategyKind;

/// Public entry point in front of the router
pub struct Gateway {
    auth: ApiKeyAuth,
    validator: QueryValidator,
    router: Arc<dyn RouterClient>,
    proxy_url: String,
}

impl Gateway {
    pub fn new(
        auth: ApiKeyAuth,
        validator: QueryValidator,
        router: Arc<dyn RouterClient>,
        proxy_url: String,
    ) -> Self {
        Self {
            auth,
            validator,
            router,
            proxy_url,
        }
    }

    /// Gateway wired to the HTTP router client from configuration
    pub fn from_config(config: &ReplGateConfig) -> Result<Self> {
        config.validate_gateway()?;

        let client = HttpRouterClient::new(
            &config.gateway.router_url,
            config.request_timeout(),
            config.strategy_timeout(),
        )?;
        let proxy_url = client.base_url().to_string();

        Ok(Self::new(
            ApiKeyAuth::new(config.gateway.api_key.clone()),
            QueryValidator::from_config(&config.gateway)?,
            Arc::new(client),
            proxy_url,
        ))
    }

    pub fn health(&self) -> GatewayHealth {
        GatewayHealth {
            status: "healthy".to_string(),
            proxy_url: self.proxy_url.clone(),
        }
    }

    /// Run a query on behalf of a client.
    ///
    /// Returns `Err(Error::Unauthorized)` for a bad key and
    /// `Err(Error::UpstreamUnavailable)` when the router cannot be reached.
    /// Policy rejections and database failures are `Ok` with `success = false`.
    pub async fn execute(&self, request: QueryRequest, api_key: Option<&str>) -> Result<QueryResponse> {
        let request_id = Uuid::new_v4();

        if !self.auth.verify(api_key) {
            tracing::warn!("[{}] Unauthorized attempt", request_id);
            return Err(Error::Unauthorized);
        }

        if let Err(rejection) = self.validator.validate(&request.query) {
            tracing::warn!("[{}] Validation failed ({}): {}", request_id, rejection.code(), rejection);
            return Ok(QueryResponse::rejected(format!(
                "Query validation failed: {}",
                rejection
            )));
        }

        if let Some(strategy) = request.strategy.as_deref().filter(|s| !s.is_empty()) {
            // Best effort: the query still runs under whatever strategy is active
            if let Err(e) = self.router.change_strategy(strategy).await {
                tracing::warn!("[{}] Strategy change to '{}' failed: {}", request_id, strategy, e);
            }
        }

        let start = Instant::now();
        let forwarded = RouteRequest {
            query: request.query,
            args: request.args,
        };

        match self.router.query(&forwarded).await {
            Ok(result) => {
                tracing::debug!(
                    "[{}] Routed [{}] -> {} (success: {})",
                    request_id,
                    result.query_type,
                    result.target_host,
                    result.success
                );
                Ok(QueryResponse::from_routed(result, start.elapsed()))
            }
            Err(e @ Error::UpstreamUnavailable(_)) => {
                tracing::error!("[{}] Proxy error: {}", request_id, e);
                Err(e)
            }
            Err(e) => {
                tracing::error!("[{}] Execution error: {}", request_id, e);
                Ok(QueryResponse::rejected(e.to_string()))
            }
        }
    }

    /// `execute` with the strategy pinned, whatever the request asked for
    pub async fn execute_with_strategy(
        &self,
        strategy: StrategyKind,
        mut request: QueryRequest,
        api_key: Option<&str>,
    ) -> Result<QueryResponse> {
        request.strategy = Some(strategy.to_string());
        self.execute(request, api_key).await
    }
}
