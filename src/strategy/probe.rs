//! Latency Probing
//!
//! Measures how long it takes to open a TCP connection to a database host.
//! Only connection establishment is timed, never query execution.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::topology::host_port;

/// Something that can time a connection to a host
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    /// Connect round-trip time, or `None` when the host is unreachable
    /// (refused, timed out, unresolvable). `None` sorts as infinitely slow.
    async fn measure(&self, host: &str) -> Option<Duration>;
}

/// Probe that opens (and immediately drops) a TCP connection
#[derive(Debug, Clone)]
pub struct TcpLatencyProbe {
    port: u16,
    connect_timeout: Duration,
}

impl TcpLatencyProbe {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }
}

#[async_trait]
impl LatencyProbe for TcpLatencyProbe {
    async fn measure(&self, host: &str) -> Option<Duration> {
        let (addr, port) = host_port(host, self.port);
        let start = Instant::now();

        match timeout(self.connect_timeout, TcpStream::connect((addr, port))).await {
            Ok(Ok(_stream)) => {
                let elapsed = start.elapsed();
                tracing::debug!("Probe {}:{} took {:?}", addr, port, elapsed);
                Some(elapsed)
            }
            Ok(Err(e)) => {
                tracing::debug!("Probe {}:{} failed: {}", addr, port, e);
                None
            }
            Err(_) => {
                tracing::debug!("Probe {}:{} timed out after {:?}", addr, port, self.connect_timeout);
                None
            }
        }
    }
}
