//! ReplGate - Read/Write Splitting Gateway for Replicated MySQL
//!
//! A two-tier front end for a primary/replica MySQL cluster. Clients talk to
//! the gateway over HTTP; the gateway authenticates and validates each query
//! and forwards it to the router, which sends writes to the primary and reads
//! to a node chosen by the active routing strategy.
//!
//! # Architecture
//!
//! ```text
//! client -> Gateway (auth, validation) -> Router (classify, strategy) -> MySQL
//! ```
//!
//! # Features
//!
//! - Write/read classification by statement prefix
//! - Runtime-switchable read strategies: `direct_hit`, `random`, `customized`
//! - Latency-probed replica selection with a TTL-bounded decision cache
//! - API key check and a regex blocklist for dangerous statements
//! - Load driver and statistics for comparing strategies

pub mod api;
pub mod bench;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod router;
pub mod strategy;
pub mod topology;

pub use config::ReplGateConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classify::{classify, QueryType};
    pub use crate::config::ReplGateConfig;
    pub use crate::error::{Error, Result};
    pub use crate::strategy::{LatencyProbe, StrategyKind};
    pub use crate::topology::Topology;
}
