//! HTTP API Types
//!
//! Request and response bodies exchanged between clients, the gateway and
//! the router.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::QueryType;
use crate::strategy::StrategyKind;

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

// ============ Gateway ============

/// Query submitted by a client to the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub args: Option<Vec<Value>>,
    /// Strategy to switch the router to before running the query
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Uniform gateway response envelope. Every field is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Option<Vec<Row>>,
    pub rows_affected: Option<u64>,
    pub target_host: Option<String>,
    pub query_type: Option<QueryType>,
    pub strategy: Option<StrategyKind>,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl QueryResponse {
    /// Failure that never reached the routing stage
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Normalize a router result, replacing its latency with the gateway's
    /// round-trip measurement
    pub fn from_routed(result: RoutedResult, latency: Duration) -> Self {
        Self {
            success: result.success,
            data: result.data,
            rows_affected: result.rows_affected,
            target_host: Some(result.target_host),
            query_type: Some(result.query_type),
            strategy: Some(result.strategy),
            latency_ms: Some(round_ms(latency)),
            error: result.error,
        }
    }
}

/// Gateway health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub status: String,
    pub proxy_url: String,
}

/// Gateway root descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

// ============ Router ============

/// Query forwarded by the gateway to the router
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteRequest {
    pub query: String,
    #[serde(default)]
    pub args: Option<Vec<Value>>,
}

/// Router result. Routing metadata is populated on success and failure alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    pub target_host: String,
    pub query_type: QueryType,
    pub strategy: StrategyKind,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Strategy change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

/// Strategy change acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyChanged {
    pub success: bool,
    pub strategy: StrategyKind,
}

/// Current strategy and the available names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub strategy: StrategyKind,
    pub available: Vec<String>,
}

/// Router health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterHealth {
    pub status: String,
    pub strategy: StrategyKind,
    pub primary: String,
    pub replicas: Vec<String>,
}

// ============ Shared ============

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Milliseconds rounded to two decimals
pub fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_micros() as f64 / 10.0).round() / 100.0
}
