//! ReplGate - Read/Write Splitting Gateway for Replicated MySQL
//!
//! Runs either tier of the service (router or gateway) from one binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use replgate::config::ReplGateConfig;
use replgate::error::Result;
use replgate::gateway::{Gateway, GatewayServer};
use replgate::router::{MySqlExecutor, QueryRouter, RouterServer, RoutingContext};
use replgate::strategy::{StrategySettings, TcpLatencyProbe};
use replgate::topology::Topology;

/// ReplGate - Read/Write Splitting Gateway
#[derive(Parser)]
#[command(name = "replgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "replgate.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the router (classification + strategy engine)
    Router,

    /// Start the public gateway (auth + validation)
    Gateway,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "replgate.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show topology and service settings
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Router => {
            let config = load_config(&cli.config, cli.log_level.as_deref())?;
            run_router(config).await
        }
        Commands::Gateway => {
            let config = load_config(&cli.config, cli.log_level.as_deref())?;
            run_gateway(config).await
        }
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load configuration and start logging with its settings
fn load_config(path: &PathBuf, log_level: Option<&str>) -> Result<ReplGateConfig> {
    let config = match ReplGateConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            init_logging(log_level.unwrap_or("info"), "pretty");
            tracing::error!("Failed to load configuration from {:?}: {}", path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };

    init_logging(
        log_level.unwrap_or(config.logging.level.as_str()),
        &config.logging.format,
    );
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Received shutdown signal");
}

/// Run the router service
async fn run_router(config: ReplGateConfig) -> Result<()> {
    let topology = Topology::from(&config.cluster);
    tracing::info!(
        "Starting ReplGate router (primary: {}, replicas: {:?})",
        topology.primary,
        topology.replicas
    );

    let probe = Arc::new(TcpLatencyProbe::new(config.database.port, config.probe_timeout()));
    let settings = StrategySettings::new(config.cache_ttl(), probe);
    let routing = Arc::new(RoutingContext::new(topology, settings, config.default_strategy()));
    let executor = Arc::new(MySqlExecutor::new(config.database.clone()));

    tracing::info!(
        "Database user {} on port {}, default strategy {}",
        config.database.user,
        config.database.port,
        config.default_strategy()
    );

    let router = Arc::new(QueryRouter::new(routing, executor));
    let server = RouterServer::new(config.router.bind_address.clone(), router);

    if let Err(e) = server.start(shutdown_signal()).await {
        tracing::error!("Router server error: {}", e);
        return Err(e);
    }

    tracing::info!("ReplGate router shutdown complete");
    Ok(())
}

/// Run the gateway service
async fn run_gateway(config: ReplGateConfig) -> Result<()> {
    let gateway = match Gateway::from_config(&config) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            tracing::error!("Invalid gateway configuration: {}", e);
            return Err(e);
        }
    };
    tracing::info!("Starting ReplGate gateway (router: {})", config.gateway.router_url);

    let server = GatewayServer::new(
        config.gateway.bind_address.clone(),
        config.gateway.cors_enabled,
        gateway,
    );

    if let Err(e) = server.start(shutdown_signal()).await {
        tracing::error!("Gateway server error: {}", e);
        return Err(e);
    }

    tracing::info!("ReplGate gateway shutdown complete");
    Ok(())
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# ReplGate Configuration
# Generated configuration file

[cluster]
primary = "10.0.1.10"
replicas = ["10.0.1.11", "10.0.1.12"]

[database]
port = 3306
user = "replgate"
password = "changeme"
database = "sakila"
connect_timeout_secs = 10
statement_timeout_secs = 30

[router]
bind_address = "0.0.0.0:8000"
default_strategy = "direct_hit"   # direct_hit | random | customized
cache_ttl_ms = 5000
probe_timeout_ms = 2000

[gateway]
bind_address = "0.0.0.0:8080"
api_key = "change-this-key"
router_url = "http://127.0.0.1:8000"
request_timeout_secs = 30
strategy_timeout_secs = 10
max_query_length = 10000
cors_enabled = false
# blocked_patterns = ['\bDROP\s+TABLE\b', '\bGRANT\b']

[logging]
level = "info"
format = "pretty"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure your cluster hosts and credentials.");
    println!("Then start with:");
    println!("  replgate --config {} router", output.display());
    println!("  replgate --config {} gateway", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    let result = ReplGateConfig::from_file(&config_path).and_then(|config| {
        config.validate_gateway()?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Primary: {}", config.cluster.primary);
            println!("  Replicas: {}", config.cluster.replicas.len());
            println!("  Default Strategy: {}", config.default_strategy());
            println!("  Router: {}", config.router.bind_address);
            println!("  Gateway: {} -> {}", config.gateway.bind_address, config.gateway.router_url);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show topology and service settings
fn run_info(config_path: PathBuf) -> Result<()> {
    let config = ReplGateConfig::from_file(&config_path)?;

    println!("ReplGate Information");
    println!("====================");
    println!();
    println!("Cluster:");
    println!("  Primary:        {}", config.cluster.primary);
    if config.cluster.replicas.is_empty() {
        println!("  Replicas:       (none - reads go to the primary)");
    } else {
        for replica in &config.cluster.replicas {
            println!("  Replica:        {}", replica);
        }
    }
    println!();
    println!("Database:");
    println!("  Port:           {}", config.database.port);
    println!("  User:           {}", config.database.user);
    println!("  Schema:         {}", config.database.database.as_deref().unwrap_or("(none)"));
    println!("  Timeouts:       connect {}s, statement {}s",
        config.database.connect_timeout_secs,
        config.database.statement_timeout_secs);
    println!();
    println!("Router:");
    println!("  Bind Address:   {}", config.router.bind_address);
    println!("  Strategy:       {}", config.default_strategy());
    println!("  Cache TTL:      {} ms", config.router.cache_ttl_ms);
    println!("  Probe Timeout:  {} ms", config.router.probe_timeout_ms);
    println!();
    println!("Gateway:");
    println!("  Bind Address:   {}", config.gateway.bind_address);
    println!("  Router URL:     {}", config.gateway.router_url);
    println!("  Max Query Len:  {}", config.gateway.max_query_length);
    println!("  Blocklist:      {}", match &config.gateway.blocked_patterns {
        Some(patterns) => format!("{} custom patterns", patterns.len()),
        None => "built-in".to_string(),
    });
    println!("  CORS:           {}", config.gateway.cors_enabled);

    Ok(())
}
