//! Cluster Topology
//!
//! One writable primary and an ordered, fixed set of replicas.

use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;

/// Static view of the database cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Writable primary host
    pub primary: String,
    /// Read-only replicas, in configured order
    pub replicas: Vec<String>,
}

impl Topology {
    pub fn new(primary: impl Into<String>, replicas: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            replicas,
        }
    }

    pub fn has_replicas(&self) -> bool {
        !self.replicas.is_empty()
    }
}

impl From<&ClusterConfig> for Topology {
    fn from(cluster: &ClusterConfig) -> Self {
        Self::new(cluster.primary.clone(), cluster.replicas.clone())
    }
}

/// Split an optional `:port` suffix off a host entry.
///
/// Hosts are usually bare addresses sharing the configured database port;
/// `host:port` overrides it for a single node. Bracketed IPv6 literals are
/// accepted with a port (`[::1]:3307`); bare IPv6 literals keep the default.
pub fn host_port(host: &str, default_port: u16) -> (&str, u16) {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(default_port);
            return (addr, port);
        }
    }

    match host.rsplit_once(':') {
        Some((addr, port)) if !addr.contains(':') => match port.parse() {
            Ok(port) => (addr, port),
            Err(_) => (host, default_port),
        },
        _ => (host, default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port() {
        assert_eq!(host_port("10.0.0.4", 3306), ("10.0.0.4", 3306));
        assert_eq!(host_port("10.0.0.4:3307", 3306), ("10.0.0.4", 3307));
        assert_eq!(host_port("db-replica-1:abc", 3306), ("db-replica-1:abc", 3306));
        assert_eq!(host_port("[::1]:3310", 3306), ("::1", 3310));
        assert_eq!(host_port("fe80::1", 3306), ("fe80::1", 3306));
    }

    #[test]
    fn test_from_cluster_config() {
        let cluster = ClusterConfig {
            primary: "p".into(),
            replicas: vec!["r1".into(), "r2".into()],
        };
        let topology = Topology::from(&cluster);
        assert_eq!(topology.primary, "p");
        assert!(topology.has_replicas());
        assert!(!Topology::new("p", vec![]).has_replicas());
    }
}
