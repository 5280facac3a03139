/// Monitoring engine module - heartbeats and node test cycles
///
/// This module is responsible for:
/// - Probing node batches concurrently
/// - Running one account's test cycle and reporting results
/// - Scheduling heartbeat and test passes over all accounts
pub mod cycle;
pub mod heartbeat;
pub mod prober;
pub mod scheduler;
pub mod types;

pub use cycle::{CycleOutcome, TestCycle};
pub use heartbeat::{HeartbeatOutcome, send_heartbeat};
pub use prober::{HttpProber, Prober};
pub use scheduler::{AccountTasks, ProbeTasks, ScheduleConfig, Scheduler};
pub use types::{ProbeResult, ProbeStatus};
