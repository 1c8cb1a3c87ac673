//! Routing Context
//!
//! Owns the active strategy. The (name, instance) pair lives behind a single
//! `Arc` that is swapped whole, so readers never see a half-built pair.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::classify::QueryType;
use crate::error::Result;
use crate::strategy::{Strategy, StrategyKind, StrategySettings};
use crate::topology::Topology;

/// The currently installed strategy
#[derive(Debug)]
pub struct ActiveStrategy {
    pub kind: StrategyKind,
    pub strategy: Strategy,
}

/// Where a query will run, and under which strategy that was decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub target_host: String,
    pub strategy: StrategyKind,
}

/// Shared routing state for the router service
pub struct RoutingContext {
    topology: Topology,
    settings: StrategySettings,
    default_kind: StrategyKind,
    /// `None` until the first query or strategy change
    active: RwLock<Option<Arc<ActiveStrategy>>>,
}

impl RoutingContext {
    pub fn new(topology: Topology, settings: StrategySettings, default_kind: StrategyKind) -> Self {
        Self {
            topology,
            settings,
            default_kind,
            active: RwLock::new(None),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Snapshot of the active strategy, installing the default on first use
    pub async fn active(&self) -> Arc<ActiveStrategy> {
        if let Some(active) = self.active.read().await.as_ref() {
            return Arc::clone(active);
        }

        let mut guard = self.active.write().await;
        let active = guard.get_or_insert_with(|| {
            tracing::info!("No strategy chosen yet, using default: {}", self.default_kind);
            Arc::new(self.build(self.default_kind))
        });
        Arc::clone(active)
    }

    /// Replace the active strategy. Unknown names leave the current one untouched.
    pub async fn change_strategy(&self, name: &str) -> Result<StrategyKind> {
        let kind: StrategyKind = name.parse()?;
        let next = Arc::new(self.build(kind));

        *self.active.write().await = Some(next);
        tracing::info!("Strategy set to: {}", kind);

        Ok(kind)
    }

    /// Pick the host for a query of the given type.
    /// Writes go to the primary no matter which strategy is active.
    pub async fn resolve_target(&self, query_type: QueryType) -> Route {
        let active = self.active().await;

        let target_host = match query_type {
            QueryType::Write => self.topology.primary.clone(),
            QueryType::Read => active.strategy.select_read_target(&self.topology).await,
        };

        Route {
            target_host,
            strategy: active.kind,
        }
    }

    fn build(&self, kind: StrategyKind) -> ActiveStrategy {
        ActiveStrategy {
            kind,
            strategy: Strategy::new(kind, &self.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::SyntheticProbe;
    use std::time::Duration;

    fn context(replicas: Vec<String>, probe: Arc<SyntheticProbe>) -> RoutingContext {
        RoutingContext::new(
            Topology::new("P", replicas),
            StrategySettings::new(Duration::from_secs(5), probe),
            StrategyKind::DirectHit,
        )
    }

    #[tokio::test]
    async fn test_lazy_default() {
        let ctx = context(vec!["R1".into()], Arc::new(SyntheticProbe::new()));
        assert!(ctx.active.read().await.is_none());

        let active = ctx.active().await;
        assert_eq!(active.kind, StrategyKind::DirectHit);
        assert!(Arc::ptr_eq(&active, &ctx.active().await));
    }

    #[tokio::test]
    async fn test_change_strategy_swaps_whole_pair() {
        let ctx = context(vec!["R1".into()], Arc::new(SyntheticProbe::new()));
        let before = ctx.active().await;

        assert_eq!(ctx.change_strategy("random").await.unwrap(), StrategyKind::Random);
        let after = ctx.active().await;

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.kind, after.strategy.kind());
        // old snapshot is still whole
        assert_eq!(before.kind, before.strategy.kind());
    }

    #[tokio::test]
    async fn test_unknown_strategy_keeps_current() {
        let ctx = context(vec!["R1".into()], Arc::new(SyntheticProbe::new()));
        ctx.change_strategy("random").await.unwrap();

        let err = ctx.change_strategy("round_robin").await.unwrap_err();
        assert!(matches!(err, crate::Error::UnknownStrategy { .. }));
        assert_eq!(ctx.active().await.kind, StrategyKind::Random);
    }

    #[tokio::test]
    async fn test_writes_always_hit_primary() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(1)));

        for replicas in [vec![], vec!["R1".to_string()], vec!["R1".to_string(), "R2".to_string()]] {
            let ctx = context(replicas, probe.clone());
            for kind in StrategyKind::ALL {
                ctx.change_strategy(kind.as_str()).await.unwrap();
                let route = ctx.resolve_target(QueryType::Write).await;
                assert_eq!(route.target_host, "P");
                assert_eq!(route.strategy, kind);
            }
        }
    }

    #[tokio::test]
    async fn test_reads_follow_strategy() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(20)));
        probe.set("R2", Some(Duration::from_millis(2)));
        let ctx = context(vec!["R1".into(), "R2".into()], probe);

        assert_eq!(ctx.resolve_target(QueryType::Read).await.target_host, "P");

        ctx.change_strategy("customized").await.unwrap();
        let route = ctx.resolve_target(QueryType::Read).await;
        assert_eq!(route.target_host, "R2");
        assert_eq!(route.strategy, StrategyKind::Customized);
    }

    #[tokio::test]
    async fn test_strategy_change_resets_latency_cache() {
        let probe = Arc::new(SyntheticProbe::new());
        probe.set("R1", Some(Duration::from_millis(1)));
        probe.set("R2", Some(Duration::from_millis(9)));
        let ctx = context(vec!["R1".into(), "R2".into()], probe.clone());

        ctx.change_strategy("customized").await.unwrap();
        assert_eq!(ctx.resolve_target(QueryType::Read).await.target_host, "R1");

        probe.set("R1", Some(Duration::from_millis(50)));
        // reinitialization builds a fresh instance with an empty cache
        ctx.change_strategy("customized").await.unwrap();
        assert_eq!(ctx.resolve_target(QueryType::Read).await.target_host, "R2");
    }
}
