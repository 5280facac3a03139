use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

use super::types::ProbeResult;
use crate::agent::ProxyDescriptor;
use crate::remote::NodeDescriptor;
use crate::remote::client::http_client;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes a batch of nodes.
///
/// Implementations return exactly one result per input node and never fail;
/// any problem with a node turns into an unreachable result for that node.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        nodes: &[NodeDescriptor],
        proxy: Option<&ProxyDescriptor>,
    ) -> Vec<ProbeResult>;
}

/// Plain HTTP latency prober
pub struct HttpProber {
    timeout_duration: Duration,
    limit: Option<Arc<Semaphore>>,
    accept_invalid_certs: bool,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl HttpProber {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration, limit: None, accept_invalid_certs: true }
    }

    /// Nodes are commonly served with self-signed certificates, so TLS
    /// verification is off unless this is set to false.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Cap the number of probes in flight. `0` is treated as unbounded.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.limit = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    async fn probe_node(&self, node: &NodeDescriptor, proxy: Option<&ProxyDescriptor>) -> ProbeResult {
        let _permit = match &self.limit {
            Some(limit) => limit.acquire().await.ok(),
            None => None,
        };

        match self.measure(node, proxy).await {
            Ok(latency_ms) => {
                debug!(node_id = %node.node_id, ip = %node.ip, latency_ms, "Node reachable");
                ProbeResult::reachable(node, latency_ms)
            }
            Err(e) => {
                debug!(node_id = %node.node_id, ip = %node.ip, error = %e, "Node unreachable");
                ProbeResult::unreachable(node)
            }
        }
    }

    /// Time a single GET against the node, in milliseconds
    async fn measure(&self, node: &NodeDescriptor, proxy: Option<&ProxyDescriptor>) -> Result<f64> {
        let start = Instant::now();
        let client = http_client(self.timeout_duration, proxy, self.accept_invalid_certs)?;

        let response = timeout(self.timeout_duration, client.get(node_url(&node.ip)).send())
            .await
            .map_err(|_| anyhow!("probe timed out after {:?}", self.timeout_duration))?
            .map_err(|e| anyhow!("probe request failed: {}", e))?;

        let latency = start.elapsed().as_secs_f64() * 1000.0;

        if response.status().is_success() {
            Ok(latency)
        } else {
            Err(anyhow!("node answered with status code: {}", response.status()))
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(
        &self,
        nodes: &[NodeDescriptor],
        proxy: Option<&ProxyDescriptor>,
    ) -> Vec<ProbeResult> {
        join_all(nodes.iter().map(|node| self.probe_node(node, proxy))).await
    }
}

/// Nodes are probed over plain HTTP unless the address already names a scheme
fn node_url(address: &str) -> String {
    if address.contains("://") { address.to_string() } else { format!("http://{address}") }
}
