//! Latency-Probed Read Selection
//!
//! Sends reads to the replica with the fastest TCP connect time. The decision
//! is cached for a TTL so probes are paid at most once per window.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::probe::LatencyProbe;
use super::pick_random;
use crate::topology::Topology;

/// A cached routing decision. Always replaced as a whole.
#[derive(Debug, Clone)]
pub struct CachedTarget {
    pub host: String,
    pub measured_at: Instant,
}

/// Lowest-latency replica selection with a TTL cache
pub struct LatencyProbed {
    ttl: Duration,
    probe: Arc<dyn LatencyProbe>,
    cache: RwLock<Option<CachedTarget>>,
}

impl LatencyProbed {
    pub fn new(ttl: Duration, probe: Arc<dyn LatencyProbe>) -> Self {
        Self {
            ttl,
            probe,
            cache: RwLock::new(None),
        }
    }

    /// Current cached decision, fresh or not
    pub async fn cached_target(&self) -> Option<CachedTarget> {
        self.cache.read().await.clone()
    }

    pub async fn select(&self, topology: &Topology) -> String {
        if !topology.has_replicas() {
            return topology.primary.clone();
        }

        let now = Instant::now();
        if let Some(cached) = self.cache.read().await.as_ref() {
            if now.duration_since(cached.measured_at) < self.ttl {
                return cached.host.clone();
            }
        }

        // Concurrent misses may both probe; the last writer wins.
        let latencies = self.measure_all(&topology.replicas).await;
        let host = match fastest(&latencies) {
            Some(host) => host.to_string(),
            None => {
                tracing::warn!("All replicas unreachable, falling back to random replica");
                pick_random(&topology.replicas).unwrap_or(&topology.primary).clone()
            }
        };

        *self.cache.write().await = Some(CachedTarget {
            host: host.clone(),
            measured_at: now,
        });

        host
    }

    async fn measure_all(&self, replicas: &[String]) -> Vec<(String, Option<Duration>)> {
        let probes = replicas.iter().map(|host| async move {
            (host.clone(), self.probe.measure(host).await)
        });
        let latencies = join_all(probes).await;
        tracing::debug!("Replica latencies: {:?}", latencies);
        latencies
    }
}

impl std::fmt::Debug for LatencyProbed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyProbed")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Reachable host with the smallest latency; the first one wins ties
fn fastest(latencies: &[(String, Option<Duration>)]) -> Option<&str> {
    latencies
        .iter()
        .filter_map(|(host, latency)| latency.map(|l| (host, l)))
        .min_by_key(|(_, latency)| *latency)
        .map(|(host, _)| host.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::SyntheticProbe;

    fn topology() -> Topology {
        Topology::new("P", vec!["R1".into(), "R2".into(), "R3".into()])
    }

    #[test]
    fn test_fastest() {
        let latencies = vec![
            ("R1".to_string(), Some(Duration::from_millis(9))),
            ("R2".to_string(), None),
            ("R3".to_string(), Some(Duration::from_millis(2))),
        ];
        assert_eq!(fastest(&latencies), Some("R3"));
        assert_eq!(fastest(&[("R1".to_string(), None)]), None);
        assert_eq!(fastest(&[]), None);
    }

    #[tokio::test]
    async fn test_picks_lowest_latency() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(30)));
        probe.set("R2", Some(Duration::from_millis(3)));
        probe.set("R3", Some(Duration::from_millis(12)));

        let strategy = LatencyProbed::new(Duration::from_secs(5), probe.clone());
        assert_eq!(strategy.select(&topology()).await, "R2");
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_cache_holds_within_ttl() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(1)));
        probe.set("R2", Some(Duration::from_millis(50)));
        probe.set("R3", Some(Duration::from_millis(50)));

        let strategy = LatencyProbed::new(Duration::from_secs(60), probe.clone());
        assert_eq!(strategy.select(&topology()).await, "R1");

        // R1 becomes the slowest, but the cached decision still stands
        probe.set("R1", Some(Duration::from_millis(500)));
        probe.set("R3", Some(Duration::from_millis(1)));
        assert_eq!(strategy.select(&topology()).await, "R1");
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_reprobes_after_expiry() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(1)));
        probe.set("R2", Some(Duration::from_millis(50)));
        probe.set("R3", Some(Duration::from_millis(50)));

        let strategy = LatencyProbed::new(Duration::from_millis(20), probe.clone());
        assert_eq!(strategy.select(&topology()).await, "R1");

        probe.set("R1", Some(Duration::from_millis(500)));
        probe.set("R3", Some(Duration::from_millis(1)));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(strategy.select(&topology()).await, "R3");
        assert_eq!(probe.calls(), 6);
    }

    #[tokio::test]
    async fn test_all_unreachable_falls_back_to_replica() {
        let probe = Arc::new(SyntheticProbe::new());
        let strategy = LatencyProbed::new(Duration::ZERO, probe.clone());
        let topology = topology();

        for _ in 0..50 {
            let host = strategy.select(&topology).await;
            assert!(topology.replicas.contains(&host), "unexpected host {}", host);
        }
    }

    #[tokio::test]
    async fn test_outage_decision_is_cached() {
        let probe = Arc::new(SyntheticProbe::new());
        let strategy = LatencyProbed::new(Duration::from_secs(60), probe.clone());

        let first = strategy.select(&topology()).await;
        let second = strategy.select(&topology()).await;
        assert_eq!(first, second);
        assert_eq!(probe.calls(), 3);
        assert_eq!(strategy.cached_target().await.unwrap().host, first);
    }

    #[tokio::test]
    async fn test_no_replicas_returns_primary_without_probing() {
        let probe = Arc::new(SyntheticProbe::new());
        let strategy = LatencyProbed::new(Duration::from_secs(5), probe.clone());

        assert_eq!(strategy.select(&Topology::new("P", vec![])).await, "P");
        assert_eq!(probe.calls(), 0);
        assert!(strategy.cached_target().await.is_none());
    }
}
