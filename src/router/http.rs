//! Router HTTP Server
//!
//! Internal API used by the gateway: query execution and strategy control.
//! Not meant to be reachable from the Internet.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::service::QueryRouter;
use crate::api::{
    ErrorResponse, RouteRequest, RouterHealth, StrategyChanged, StrategyInfo, StrategyRequest,
};
use crate::error::{Error, Result};
use crate::strategy::StrategyKind;

/// Router HTTP server
pub struct RouterServer {
    bind_address: String,
    router: Arc<QueryRouter>,
}

impl RouterServer {
    pub fn new(bind_address: String, router: Arc<QueryRouter>) -> Self {
        Self {
            bind_address,
            router,
        }
    }

    /// Build the axum application
    pub fn app(router: Arc<QueryRouter>) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/strategy", get(handle_get_strategy).post(handle_set_strategy))
            .route("/query", post(handle_query))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(router)
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = Self::app(Arc::clone(&self.router));

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!("Router listening on {}", self.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(format!("Router server error: {}", e)))?;

        Ok(())
    }
}

// ============ Handlers ============

async fn handle_health(State(router): State<Arc<QueryRouter>>) -> impl IntoResponse {
    let routing = router.routing();
    let active = routing.active().await;
    let topology = routing.topology();

    Json(RouterHealth {
        status: "healthy".to_string(),
        strategy: active.kind,
        primary: topology.primary.clone(),
        replicas: topology.replicas.clone(),
    })
}

async fn handle_get_strategy(State(router): State<Arc<QueryRouter>>) -> impl IntoResponse {
    Json(StrategyInfo {
        strategy: router.routing().active().await.kind,
        available: StrategyKind::names().into_iter().map(String::from).collect(),
    })
}

async fn handle_set_strategy(
    State(router): State<Arc<QueryRouter>>,
    Json(req): Json<StrategyRequest>,
) -> impl IntoResponse {
    match router.routing().change_strategy(&req.strategy).await {
        Ok(kind) => Json(StrategyChanged {
            success: true,
            strategy: kind,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!("Rejected strategy change: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn handle_query(
    State(router): State<Arc<QueryRouter>>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    Json(router.execute(&req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RoutedResult;
    use crate::router::context::RoutingContext;
    use crate::router::executor::test_support::RecordingExecutor;
    use crate::strategy::test_support::SyntheticProbe;
    use crate::strategy::StrategySettings;
    use crate::topology::Topology;
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn spawn_router() -> SocketAddr {
        let routing = RoutingContext::new(
            Topology::new("P", vec!["R1".into(), "R2".into()]),
            StrategySettings::new(Duration::from_secs(5), Arc::new(SyntheticProbe::new())),
            StrategyKind::DirectHit,
        );
        let router = Arc::new(QueryRouter::new(
            Arc::new(routing),
            Arc::new(RecordingExecutor::new()),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, RouterServer::app(router)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_health_and_strategy_endpoints() {
        let addr = spawn_router().await;
        let client = reqwest::Client::new();

        let health: serde_json::Value = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["strategy"], "direct_hit");
        assert_eq!(health["primary"], "P");
        assert_eq!(health["replicas"], serde_json::json!(["R1", "R2"]));

        let info: serde_json::Value = client
            .get(format!("http://{}/strategy", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(info["available"], serde_json::json!(["direct_hit", "random", "customized"]));

        let changed = client
            .post(format!("http://{}/strategy", addr))
            .json(&serde_json::json!({"strategy": "random"}))
            .send()
            .await
            .unwrap();
        assert_eq!(changed.status(), 200);
        let changed: serde_json::Value = changed.json().await.unwrap();
        assert_eq!(changed, serde_json::json!({"success": true, "strategy": "random"}));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_bad_request() {
        let addr = spawn_router().await;
        let response = reqwest::Client::new()
            .post(format!("http://{}/strategy", addr))
            .json(&serde_json::json!({"strategy": "round_robin"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(body.error.contains("round_robin"));
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let addr = spawn_router().await;
        let result: RoutedResult = reqwest::Client::new()
            .post(format!("http://{}/query", addr))
            .json(&serde_json::json!({"query": "DELETE FROM t WHERE id = ?", "args": [7]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.target_host, "P");
        assert_eq!(result.rows_affected, Some(1));
    }
}
