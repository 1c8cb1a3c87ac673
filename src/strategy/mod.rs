//! Read Routing Strategies
//!
//! A closed set of policies choosing which host serves a READ. Writes never
//! consult a strategy; they always go to the primary.

mod latency;
mod probe;

pub use latency::{CachedTarget, LatencyProbed};
pub use probe::{LatencyProbe, TcpLatencyProbe};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::topology::Topology;

/// Names of the available strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Every read goes to the primary
    DirectHit,
    /// Reads go to a uniformly random replica
    Random,
    /// Reads go to the replica with the lowest connect latency
    Customized,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::DirectHit,
        StrategyKind::Random,
        StrategyKind::Customized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DirectHit => "direct_hit",
            StrategyKind::Random => "random",
            StrategyKind::Customized => "customized",
        }
    }

    /// All strategy names, in registry order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| Error::UnknownStrategy {
                name: name.to_string(),
                available: Self::names().join(", "),
            })
    }
}

/// Inputs every strategy instance is built from
#[derive(Clone)]
pub struct StrategySettings {
    /// How long a latency-probed decision stays valid
    pub cache_ttl: Duration,
    /// How replicas are probed
    pub probe: Arc<dyn LatencyProbe>,
}

impl StrategySettings {
    pub fn new(cache_ttl: Duration, probe: Arc<dyn LatencyProbe>) -> Self {
        Self { cache_ttl, probe }
    }
}

/// A live read-routing policy
#[derive(Debug)]
pub enum Strategy {
    FixedPrimary,
    UniformRandom,
    LatencyProbed(LatencyProbed),
}

impl Strategy {
    /// Build a fresh instance (empty cache) for the given kind
    pub fn new(kind: StrategyKind, settings: &StrategySettings) -> Self {
        match kind {
            StrategyKind::DirectHit => Strategy::FixedPrimary,
            StrategyKind::Random => Strategy::UniformRandom,
            StrategyKind::Customized => Strategy::LatencyProbed(LatencyProbed::new(
                settings.cache_ttl,
                Arc::clone(&settings.probe),
            )),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::FixedPrimary => StrategyKind::DirectHit,
            Strategy::UniformRandom => StrategyKind::Random,
            Strategy::LatencyProbed(_) => StrategyKind::Customized,
        }
    }

    /// Host that should serve the next read.
    /// Falls back to the primary when there are no replicas.
    pub async fn select_read_target(&self, topology: &Topology) -> String {
        match self {
            Strategy::FixedPrimary => topology.primary.clone(),
            Strategy::UniformRandom => pick_random(&topology.replicas)
                .unwrap_or(&topology.primary)
                .clone(),
            Strategy::LatencyProbed(latency) => latency.select(topology).await,
        }
    }
}

fn pick_random(hosts: &[String]) -> Option<&String> {
    hosts.choose(&mut rand::thread_rng())
}
