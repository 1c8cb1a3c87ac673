//! Query Router
//!
//! Classify -> pick target -> execute -> shape the result.

use std::sync::Arc;

use tokio::time::Instant;

use super::context::RoutingContext;
use super::executor::{QueryExecutor, QueryOutcome};
use crate::api::{round_ms, RouteRequest, RoutedResult};
use crate::classify::classify;

/// Routes each query to the primary or a replica and runs it there
pub struct QueryRouter {
    routing: Arc<RoutingContext>,
    executor: Arc<dyn QueryExecutor>,
}

impl QueryRouter {
    pub fn new(routing: Arc<RoutingContext>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { routing, executor }
    }

    pub fn routing(&self) -> &RoutingContext {
        &self.routing
    }

    /// Execute one statement. Database failures come back as `success = false`
    /// with the routing metadata still filled in.
    pub async fn execute(&self, request: &RouteRequest) -> RoutedResult {
        let start = Instant::now();

        let query_type = classify(&request.query);
        let route = self.routing.resolve_target(query_type).await;

        tracing::info!(
            "Query [{}] -> {} (strategy: {})",
            query_type,
            route.target_host,
            route.strategy
        );

        let args = request.args.as_deref().unwrap_or(&[]);
        let outcome = self
            .executor
            .execute(&route.target_host, &request.query, args)
            .await;

        let mut result = RoutedResult {
            success: true,
            data: None,
            rows_affected: None,
            target_host: route.target_host,
            query_type,
            strategy: route.strategy,
            latency_ms: 0.0,
            error: None,
        };

        match outcome {
            Ok(QueryOutcome::Rows(rows)) => result.data = Some(rows),
            Ok(QueryOutcome::Affected(count)) => result.rows_affected = Some(count),
            Err(e) => {
                tracing::error!("Query failed on {}: {}", result.target_host, e);
                result.success = false;
                result.error = Some(e.to_string());
            }
        }

        result.latency_ms = round_ms(start.elapsed());
        result
    }
}
