use tracing::{debug, warn};

use crate::agent::Account;
use crate::remote::{HeartbeatAck, RemoteService};

/// What happened to one heartbeat attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Sent,
    RateLimited,
    /// Public IP lookup failed, so nothing was sent
    NoIp,
    Failed,
}

/// Resolve the account's egress address and announce it.
///
/// Best effort: the next heartbeat tick is the only retry.
pub async fn send_heartbeat(remote: &dyn RemoteService, account: &Account) -> HeartbeatOutcome {
    let proxy = account.proxy.as_ref();

    let ip = match remote.resolve_own_ip(proxy).await {
        Ok(ip) => ip,
        Err(e) => {
            warn!(account = %account.identifier, error = %e, "Failed to resolve public IP, heartbeat skipped");
            return HeartbeatOutcome::NoIp;
        }
    };

    match remote.heartbeat(&account.token, &ip, proxy).await {
        Ok(HeartbeatAck::Accepted) => {
            debug!(account = %account.identifier, %ip, "Heartbeat sent");
            HeartbeatOutcome::Sent
        }
        Ok(HeartbeatAck::RateLimited) => HeartbeatOutcome::RateLimited,
        Err(e) => {
            debug!(account = %account.identifier, error = %e, "Heartbeat failed");
            HeartbeatOutcome::Failed
        }
    }
}
