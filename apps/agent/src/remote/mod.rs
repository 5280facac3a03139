/// Remote service module - talks to the pipe network backend
///
/// Every call takes the proxy to use as an explicit argument; the client
/// never stores one.
pub mod client;
pub mod types;

pub use client::{ClientError, ServiceClient};
pub use types::{HeartbeatAck, NodeDescriptor, NodeId};

use async_trait::async_trait;

use crate::agent::ProxyDescriptor;
use crate::monitoring::ProbeResult;

/// Backend operations the scheduler needs while running.
///
/// An `Err` is the "absent" outcome: callers log it and skip the step.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn heartbeat(
        &self,
        token: &str,
        ip: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<HeartbeatAck, ClientError>;

    async fn fetch_nodes(
        &self,
        token: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Vec<NodeDescriptor>, ClientError>;

    async fn report_result(
        &self,
        token: &str,
        result: &ProbeResult,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<(), ClientError>;

    async fn fetch_points(
        &self,
        token: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<f64, ClientError>;

    /// Externally visible address of this host as seen through `proxy`
    async fn resolve_own_ip(&self, proxy: Option<&ProxyDescriptor>) -> Result<String, ClientError>;
}
