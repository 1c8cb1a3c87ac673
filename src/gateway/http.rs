//! Gateway HTTP Server
//!
//! The only Internet-facing surface. Auth failures are 401, an unreachable
//! router is 502; everything else comes back as the uniform envelope.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::service::Gateway;
use crate::api::{ErrorResponse, QueryRequest, ServiceInfo};
use crate::error::{Error, Result};
use crate::strategy::StrategyKind;

/// Header carrying the client's API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Gateway HTTP server
pub struct GatewayServer {
    bind_address: String,
    cors_enabled: bool,
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    pub fn new(bind_address: String, cors_enabled: bool, gateway: Arc<Gateway>) -> Self {
        Self {
            bind_address,
            cors_enabled,
            gateway,
        }
    }

    /// Build the axum application
    pub fn app(gateway: Arc<Gateway>, cors_enabled: bool) -> Router {
        let router = Router::new()
            .route("/", get(handle_root))
            .route("/health", get(handle_health))
            .route("/query", post(handle_query))
            .route("/query/direct", post(handle_query_direct))
            .route("/query/random", post(handle_query_random))
            .route("/query/customized", post(handle_query_customized))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(gateway);

        if cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = Self::app(Arc::clone(&self.gateway), self.cors_enabled);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!("Gateway listening on {}", self.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(format!("Gateway server error: {}", e)))?;

        Ok(())
    }
}

// ============ Handlers ============

async fn handle_root() -> impl IntoResponse {
    Json(ServiceInfo {
        service: "ReplGate Gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: [
            "/health",
            "/query",
            "/query/direct",
            "/query/random",
            "/query/customized",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    })
}

async fn handle_health(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.health())
}

async fn handle_query(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Response {
    respond(gateway.execute(req, api_key(&headers)).await)
}

async fn handle_query_direct(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Response {
    respond(
        gateway
            .execute_with_strategy(StrategyKind::DirectHit, req, api_key(&headers))
            .await,
    )
}

async fn handle_query_random(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Response {
    respond(
        gateway
            .execute_with_strategy(StrategyKind::Random, req, api_key(&headers))
            .await,
    )
}

async fn handle_query_customized(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Response {
    respond(
        gateway
            .execute_with_strategy(StrategyKind::Customized, req, api_key(&headers))
            .await,
    )
}

// ============ Helpers ============

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

fn respond<T: serde::Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            let status = match e {
                Error::Unauthorized => StatusCode::UNAUTHORIZED,
                Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
