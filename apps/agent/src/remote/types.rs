use std::fmt;

use serde::{Deserialize, Serialize};

/// Node identifier as handed out by the backend, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Number(u64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Number(n) => write!(f, "{n}"),
            NodeId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A node to probe during a test cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub node_id: NodeId,
    /// Network address, usually `host` or `host:port`
    pub ip: String,
}

/// Outcome of a heartbeat call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAck {
    Accepted,
    /// The backend answered 429, which is not treated as a failure
    RateLimited,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignupRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(rename = "referralCode", skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HeartbeatRequest<'a> {
    pub ip: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointsResponse {
    pub points: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IpResponse {
    pub ip: String,
}
