use serde::{Deserialize, Serialize};

use crate::remote::{NodeDescriptor, NodeId};

/// Latency reported for nodes that did not answer in time
pub const UNREACHABLE_LATENCY: f64 = -1.0;

/// Reachability of a probed node.
///
/// The backend only understands the two status strings it was built
/// against; `Display` gives the English names used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    #[serde(rename = "在线")]
    Reachable,
    #[serde(rename = "离线")]
    Unreachable,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Reachable => write!(f, "online"),
            ProbeStatus::Unreachable => write!(f, "offline"),
        }
    }
}

/// Result of probing one node. Serializes to the `/test` report body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub node_id: NodeId,

    /// Address that was probed
    pub ip: String,

    /// Round trip in milliseconds, or [`UNREACHABLE_LATENCY`]
    pub latency: f64,

    pub status: ProbeStatus,
}

impl ProbeResult {
    pub fn reachable(node: &NodeDescriptor, latency_ms: f64) -> Self {
        Self {
            node_id: node.node_id.clone(),
            ip: node.ip.clone(),
            latency: latency_ms.max(0.0),
            status: ProbeStatus::Reachable,
        }
    }

    pub fn unreachable(node: &NodeDescriptor) -> Self {
        Self {
            node_id: node.node_id.clone(),
            ip: node.ip.clone(),
            latency: UNREACHABLE_LATENCY,
            status: ProbeStatus::Unreachable,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status == ProbeStatus::Reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeDescriptor {
        NodeDescriptor { node_id: NodeId::Number(3), ip: "10.1.1.1".into() }
    }

    #[test]
    fn test_report_body_shape() {
        let body = serde_json::to_value(ProbeResult::reachable(&node(), 42.5)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "node_id": 3, "ip": "10.1.1.1", "latency": 42.5, "status": "在线" })
        );

        let body = serde_json::to_value(ProbeResult::unreachable(&node())).unwrap();
        assert_eq!(body["latency"], -1.0);
        assert_eq!(body["status"], "离线");
    }
}
