//! Strategy Benchmark
//!
//! Drives a mix of INSERTs and SELECTs through the gateway's pinned
//! endpoints and summarizes latency and read distribution per strategy.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::api::QueryResponse;
use crate::error::{Error, Result};
use crate::gateway::API_KEY_HEADER;
use crate::strategy::StrategyKind;

/// Read templates over the Sakila sample schema
const READ_TEMPLATES: &[&str] = &[
    "SELECT * FROM sakila.actor WHERE actor_id = {actor_id}",
    "SELECT COUNT(*) FROM sakila.film",
    "SELECT * FROM sakila.film WHERE film_id = {film_id}",
    "SELECT a.first_name, a.last_name, COUNT(fa.film_id) as film_count FROM sakila.actor a JOIN sakila.film_actor fa ON a.actor_id = fa.actor_id WHERE a.actor_id = {actor_id} GROUP BY a.actor_id",
    "SELECT * FROM sakila.customer WHERE customer_id = {customer_id}",
];

/// Preflight read confirming the write phase has somewhere to write
const BENCHMARK_TABLE_CHECK: &str = "SELECT COUNT(*) FROM sakila.benchmark_results";

/// Host name recorded when a reply carried none
pub const UNKNOWN_TARGET: &str = "unknown";

/// Outcome of one benchmarked query
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub success: bool,
    pub latency_ms: f64,
    pub target_host: String,
    /// Envelope error, HTTP status, or transport/decode failure
    pub error: Option<String>,
}

/// Summary of one phase (all writes or all reads)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchStats {
    pub count: usize,
    pub successful: usize,
    pub errors: usize,
    pub elapsed_time_s: f64,
    pub avg_latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99_latency_ms: Option<f64>,
    pub throughput_qps: f64,
    pub targets: BTreeMap<String, usize>,
}

impl BenchStats {
    /// Summarize samples. Latency figures cover successful samples only;
    /// `targets` counts every sample.
    pub fn from_samples(samples: &[Sample], attempted: usize, elapsed: Duration) -> Self {
        let mut targets = BTreeMap::new();
        for sample in samples {
            *targets.entry(sample.target_host.clone()).or_insert(0) += 1;
        }

        let errors = samples.iter().filter(|s| !s.success).count();
        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.latency_ms)
            .collect();

        if latencies.is_empty() {
            return Self {
                count: attempted,
                errors,
                elapsed_time_s: elapsed.as_secs_f64(),
                targets,
                ..Default::default()
            };
        }

        latencies.sort_by(|a, b| a.total_cmp(b));
        let n = latencies.len();
        let max = latencies[n - 1];
        let secs = elapsed.as_secs_f64();

        Self {
            count: attempted,
            successful: n,
            errors,
            elapsed_time_s: round(secs, 2),
            avg_latency_ms: round(latencies.iter().sum::<f64>() / n as f64, 2),
            min_latency_ms: Some(round(latencies[0], 2)),
            max_latency_ms: Some(round(max, 2)),
            p50_latency_ms: Some(round(median(&latencies), 2)),
            p95_latency_ms: Some(round(percentile(&latencies, 0.95, 20), 2)),
            p99_latency_ms: Some(round(percentile(&latencies, 0.99, 100), 2)),
            throughput_qps: if secs > 0.0 {
                round(n as f64 / secs, 1)
            } else {
                0.0
            },
            targets,
        }
    }
}

/// Both phases for one strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy: StrategyKind,
    pub timestamp: DateTime<Utc>,
    pub total_time_s: f64,
    pub writes: BenchStats,
    pub reads: BenchStats,
}

/// `sorted` must be non-empty and ascending
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Nearest-rank percentile, or the max when there are `min_samples` or fewer
fn percentile(sorted: &[f64], q: f64, min_samples: usize) -> f64 {
    let n = sorted.len();
    if n > min_samples {
        sorted[((n as f64 * q) as usize).min(n - 1)]
    } else {
        sorted[n - 1]
    }
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Gateway endpoint that pins `strategy`
pub fn endpoint_path(strategy: StrategyKind) -> &'static str {
    match strategy {
        StrategyKind::DirectHit => "/query/direct",
        StrategyKind::Random => "/query/random",
        StrategyKind::Customized => "/query/customized",
    }
}

/// INSERT recording a benchmark row
pub fn write_query(strategy: StrategyKind) -> String {
    format!(
        "INSERT INTO sakila.benchmark_results (strategy, query_type, latency_ms, target_host, created_at) \
         VALUES ('{}', 'write', 0, 'pending', NOW())",
        strategy
    )
}

/// Random SELECT from the read templates
pub fn read_query<R: Rng + ?Sized>(rng: &mut R) -> String {
    let template = READ_TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or(READ_TEMPLATES[1]);

    template
        .replace("{actor_id}", &rng.gen_range(1..=200).to_string())
        .replace("{film_id}", &rng.gen_range(1..=1000).to_string())
        .replace("{customer_id}", &rng.gen_range(1..=599).to_string())
}

/// HTTP driver against a gateway
pub struct BenchClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl BenchClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Run one query through the pinned endpoint. Never fails: transport and
    /// HTTP errors become unsuccessful samples carrying the reason.
    pub async fn execute(&self, strategy: StrategyKind, query: &str) -> Sample {
        let start = Instant::now();
        let reply = self.post(endpoint_path(strategy), query).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match reply {
            Ok(body) => Sample {
                success: body.error.is_none(),
                latency_ms,
                target_host: body.target_host.unwrap_or_else(|| UNKNOWN_TARGET.to_string()),
                error: body.error,
            },
            Err(e) => Sample {
                success: false,
                latency_ms,
                target_host: UNKNOWN_TARGET.to_string(),
                error: Some(e),
            },
        }
    }

    /// Check that `sakila.benchmark_results` exists before writing to it
    pub async fn check_table(&self) -> Result<()> {
        let body = self
            .post(endpoint_path(StrategyKind::DirectHit), BENCHMARK_TABLE_CHECK)
            .await
            .map_err(|e| Error::Internal(format!("Cannot verify benchmark table: {}", e)))?;

        match body.error {
            Some(e) => Err(Error::Internal(format!("Benchmark table not found: {}", e))),
            None => Ok(()),
        }
    }

    async fn post(&self, path: &str, query: &str) -> std::result::Result<QueryResponse, String> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| format!("unreadable reply: {}", e))
    }

    /// Run `queries` with at most `concurrency` in flight
    pub async fn run_phase(&self, strategy: StrategyKind, queries: Vec<String>, concurrency: usize) -> BenchStats {
        let attempted = queries.len();
        let start = Instant::now();

        let samples: Vec<Sample> = stream::iter(queries)
            .map(|query| async move { self.execute(strategy, &query).await })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        if let Some(first) = samples.iter().find(|s| !s.success) {
            tracing::warn!(
                "First error ({} on {}): {}",
                strategy,
                first.target_host,
                first.error.as_deref().unwrap_or("unknown")
            );
        }

        BenchStats::from_samples(&samples, attempted, start.elapsed())
    }

    /// Write then read phase for one strategy
    pub async fn run_strategy(
        &self,
        strategy: StrategyKind,
        writes: usize,
        reads: usize,
        concurrency: usize,
    ) -> StrategyReport {
        let timestamp = Utc::now();
        let start = Instant::now();

        let write_queries = (0..writes).map(|_| write_query(strategy)).collect();
        let write_stats = self.run_phase(strategy, write_queries, concurrency).await;

        let read_queries = {
            let mut rng = rand::thread_rng();
            (0..reads).map(|_| read_query(&mut rng)).collect()
        };
        let read_stats = self.run_phase(strategy, read_queries, concurrency).await;

        StrategyReport {
            strategy,
            timestamp,
            total_time_s: round(start.elapsed().as_secs_f64(), 2),
            writes: write_stats,
            reads: read_stats,
        }
    }
}
