//! pipe-agent - multi-account heartbeat and node-probe agent
//!
//! For every account the agent periodically announces liveness to the pipe
//! network backend and runs test cycles: fetch the node list, probe every
//! node concurrently, report each result and read back the score.

pub mod agent;
pub mod config;
pub mod monitoring;
pub mod remote;

pub use agent::{Account, ProxyDescriptor};
pub use config::Config;
pub use monitoring::{HttpProber, ProbeResult, Scheduler, TestCycle};
pub use remote::{RemoteService, ServiceClient};
