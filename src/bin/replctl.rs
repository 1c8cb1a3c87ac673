//! ReplCtl - Command line tool for ReplGate
//!
//! Usage:
//!   replctl health                 - Check the gateway
//!   replctl query "SELECT 1"       - Run a query through the gateway
//!   replctl strategy get|set NAME  - Inspect or switch the router strategy
//!   replctl bench                  - Compare strategies under load

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use replgate::api::{QueryRequest, QueryResponse, StrategyChanged, StrategyInfo, StrategyRequest};
use replgate::bench::{BenchClient, StrategyReport};
use replgate::gateway::API_KEY_HEADER;
use replgate::strategy::StrategyKind;

/// ReplGate Control Tool
#[derive(Parser)]
#[command(name = "replctl")]
#[command(about = "Query and benchmark a ReplGate deployment", long_about = None)]
struct Cli {
    /// Gateway URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    endpoint: String,

    /// Router URL (strategy commands)
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    router: String,

    /// API key sent as X-API-Key
    #[arg(short = 'k', long, default_value = "")]
    api_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health
    Health,
    /// Run a query through the gateway
    Query {
        /// SQL text
        sql: String,
        /// Strategy to switch to first
        #[arg(short, long)]
        strategy: Option<String>,
        /// Positional arguments as a JSON array
        #[arg(short, long)]
        args: Option<String>,
    },
    /// Inspect or change the router strategy
    Strategy {
        #[command(subcommand)]
        action: StrategyAction,
    },
    /// Benchmark strategies through the pinned gateway endpoints
    Bench {
        /// INSERTs per strategy
        #[arg(short, long, default_value_t = 1000)]
        writes: usize,
        /// SELECTs per strategy
        #[arg(short, long, default_value_t = 1000)]
        reads: usize,
        /// Requests in flight
        #[arg(short, long, default_value_t = 10)]
        concurrency: usize,
        /// Single strategy to test (default: all)
        #[arg(short, long)]
        strategy: Option<String>,
        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StrategyAction {
    /// Show the active strategy
    Get,
    /// Switch the active strategy
    Set {
        /// direct_hit, random or customized
        name: String,
    },
}

#[derive(Serialize)]
struct BenchReport {
    gateway: String,
    writes: usize,
    reads: usize,
    concurrency: usize,
    strategies: Vec<StrategyReport>,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let endpoint = cli.endpoint.trim_end_matches('/').to_string();

    let result = match &cli.command {
        Commands::Health => health(&endpoint).await,
        Commands::Query { sql, strategy, args } => {
            query(&endpoint, &cli.api_key, sql, strategy.clone(), args.as_deref()).await
        }
        Commands::Strategy { action } => match action {
            StrategyAction::Get => strategy_get(&cli.router).await,
            StrategyAction::Set { name } => strategy_set(&cli.router, name).await,
        },
        Commands::Bench {
            writes,
            reads,
            concurrency,
            strategy,
            output,
        } => {
            bench(
                &endpoint,
                &cli.api_key,
                *writes,
                *reads,
                *concurrency,
                strategy.as_deref(),
                output.as_ref(),
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// ============ Commands ============

async fn health(endpoint: &str) -> anyhow::Result<()> {
    let response = reqwest::get(format!("{}/health", endpoint))
        .await
        .with_context(|| format!("cannot reach gateway at {}", endpoint))?;

    if !response.status().is_success() {
        bail!("API error: {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn query(
    endpoint: &str,
    api_key: &str,
    sql: &str,
    strategy: Option<String>,
    args: Option<&str>,
) -> anyhow::Result<()> {
    let args = args
        .map(serde_json::from_str::<Vec<serde_json::Value>>)
        .transpose()
        .context("--args must be a JSON array")?;

    let request = QueryRequest {
        query: sql.to_string(),
        args,
        strategy,
    };

    let response = reqwest::Client::new()
        .post(format!("{}/query", endpoint))
        .header(API_KEY_HEADER, api_key)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("cannot reach gateway at {}", endpoint))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status, body);
    }

    let envelope: QueryResponse = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if !envelope.success {
        std::process::exit(2);
    }
    Ok(())
}

async fn strategy_get(router: &str) -> anyhow::Result<()> {
    let response = reqwest::get(format!("{}/strategy", router.trim_end_matches('/')))
        .await
        .with_context(|| format!("cannot reach router at {}", router))?;

    if !response.status().is_success() {
        bail!("API error: {}", response.status());
    }

    let info: StrategyInfo = response.json().await?;
    println!("Active strategy: {}", info.strategy);
    println!("Available:       {}", info.available.join(", "));
    Ok(())
}

async fn strategy_set(router: &str, name: &str) -> anyhow::Result<()> {
    let response = reqwest::Client::new()
        .post(format!("{}/strategy", router.trim_end_matches('/')))
        .json(&StrategyRequest {
            strategy: name.to_string(),
        })
        .send()
        .await
        .with_context(|| format!("cannot reach router at {}", router))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status, body);
    }

    let changed: StrategyChanged = response.json().await?;
    println!("Strategy set to {}", changed.strategy);
    Ok(())
}

async fn bench(
    endpoint: &str,
    api_key: &str,
    writes: usize,
    reads: usize,
    concurrency: usize,
    strategy: Option<&str>,
    output: Option<&PathBuf>,
) -> anyhow::Result<()> {
    let strategies = match strategy {
        Some(name) => vec![name.parse::<StrategyKind>()?],
        None => StrategyKind::ALL.to_vec(),
    };

    let client = BenchClient::new(endpoint, api_key, Duration::from_secs(30))?;

    println!();
    println!("ReplGate Benchmark (replctl v{})", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("Gateway: {}", endpoint);
    println!("Config:  {} writes + {} reads per strategy, {} in flight", writes, reads, concurrency);

    client
        .check_table()
        .await
        .context("create sakila.benchmark_results before benchmarking")?;
    println!("[OK] Benchmark table ready");

    let mut reports = Vec::with_capacity(strategies.len());
    for kind in strategies {
        println!();
        println!("--- {} ---", kind.as_str().to_uppercase());

        let report = client.run_strategy(kind, writes, reads, concurrency).await;
        println!(
            "  WRITES: {}/{} ok, {:.0} QPS, avg {:.1}ms",
            report.writes.successful, writes, report.writes.throughput_qps, report.writes.avg_latency_ms
        );
        println!(
            "  READS:  {}/{} ok, {:.0} QPS, avg {:.1}ms",
            report.reads.successful, reads, report.reads.throughput_qps, report.reads.avg_latency_ms
        );
        println!("  Targets: {:?}", report.reads.targets);
        println!("  Total:   {:.1}s", report.total_time_s);
        reports.push(report);
    }

    println!();
    println!("{:<15} {:<12} {:<12} {:<12} {:<10}", "STRATEGY", "WRITE QPS", "READ QPS", "AVG MS", "ERRORS");
    println!("{}", "-".repeat(61));
    for report in &reports {
        let avg = (report.writes.avg_latency_ms + report.reads.avg_latency_ms) / 2.0;
        println!(
            "{:<15} {:<12.0} {:<12.0} {:<12.1} {:<10}",
            report.strategy.as_str(),
            report.writes.throughput_qps,
            report.reads.throughput_qps,
            avg,
            report.writes.errors + report.reads.errors
        );
    }

    if let Some(path) = output {
        let full = BenchReport {
            gateway: endpoint.to_string(),
            writes,
            reads,
            concurrency,
            strategies: reports,
        };
        std::fs::write(path, serde_json::to_string_pretty(&full)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!();
        println!("Results saved to: {}", path.display());
    }

    Ok(())
}
