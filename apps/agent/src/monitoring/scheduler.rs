use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use super::cycle::TestCycle;
use super::heartbeat::send_heartbeat;
use crate::agent::Account;
use crate::config::ScheduleSection;
use crate::remote::RemoteService;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_TEST_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Shortest interval a timer accepts
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Per-account work the scheduler drives
#[async_trait]
pub trait AccountTasks: Send + Sync {
    async fn heartbeat(&self, account: &Account);
    async fn test_cycle(&self, account: &Account);
}

/// Heartbeats and test cycles against the real backend
pub struct ProbeTasks {
    remote: Arc<dyn RemoteService>,
    cycle: TestCycle,
}

impl ProbeTasks {
    pub fn new(remote: Arc<dyn RemoteService>, cycle: TestCycle) -> Self {
        Self { remote, cycle }
    }
}

#[async_trait]
impl AccountTasks for ProbeTasks {
    async fn heartbeat(&self, account: &Account) {
        send_heartbeat(self.remote.as_ref(), account).await;
    }

    async fn test_cycle(&self, account: &Account) {
        self.cycle.run(account).await;
    }
}

/// Fixed-interval trigger.
///
/// `next_due` moves forward by exactly one interval per firing, measured
/// from the previous due time rather than from when the pass finished. An
/// overrun therefore leaves the timer due again straight away, and every
/// missed trigger still fires once.
#[derive(Debug, Clone, Copy)]
pub struct CycleTimer {
    next_due: Instant,
    interval: Duration,
}

impl CycleTimer {
    /// A timer that is due immediately. Intervals below [`MIN_INTERVAL`]
    /// are raised to it.
    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self { next_due: start, interval: interval.max(MIN_INTERVAL) }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn advance(&mut self) {
        self.next_due += self.interval;
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Heartbeat,
    Test,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub heartbeat_interval: Duration,
    pub test_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL, test_interval: DEFAULT_TEST_INTERVAL }
    }
}

impl From<&ScheduleSection> for ScheduleConfig {
    fn from(section: &ScheduleSection) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(section.heartbeat_interval_secs),
            test_interval: Duration::from_secs(section.test_interval_secs),
        }
    }
}

/// Drives heartbeat and test passes over all accounts
pub struct Scheduler {
    accounts: Vec<Account>,
    tasks: Arc<dyn AccountTasks>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(accounts: Vec<Account>, tasks: Arc<dyn AccountTasks>, config: ScheduleConfig) -> Self {
        Self { accounts, tasks, config }
    }

    /// Run until `shutdown` turns true.
    ///
    /// Both timers are due at start, heartbeat first. Shutdown is observed
    /// between accounts and while idle, and inside a test cycle built with
    /// [`TestCycle::with_shutdown`]. A call already in flight finishes or
    /// times out on its own.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let start = Instant::now();
        let mut heartbeat = CycleTimer::starting_at(start, self.config.heartbeat_interval);
        let mut test = CycleTimer::starting_at(start, self.config.test_interval);

        info!(
            accounts = self.accounts.len(),
            heartbeat_secs = self.config.heartbeat_interval.as_secs(),
            test_secs = self.config.test_interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Instant::now();

            if heartbeat.is_due(now) {
                if !self.pass(PassKind::Heartbeat, &shutdown).await {
                    break;
                }
                heartbeat.advance();
            }

            if test.is_due(now) {
                if !self.pass(PassKind::Test, &shutdown).await {
                    break;
                }
                test.advance();
                log_next_test(test.next_due());
            }

            let wake = heartbeat.next_due().min(test.next_due());
            tokio::select! {
                _ = sleep_until(wake) => {}
                changed = shutdown.changed() => {
                    // Nobody can signal us any more, keep going on the timers alone.
                    if changed.is_err() {
                        sleep_until(wake).await;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one pass over every account in order. Returns false if shutdown
    /// was requested part way through.
    async fn pass(&self, kind: PassKind, shutdown: &watch::Receiver<bool>) -> bool {
        debug!(?kind, "Starting pass");

        for account in &self.accounts {
            if *shutdown.borrow() {
                return false;
            }
            match kind {
                PassKind::Heartbeat => self.tasks.heartbeat(account).await,
                PassKind::Test => self.tasks.test_cycle(account).await,
            }
        }

        true
    }
}

fn log_next_test(next_due: Instant) {
    let remaining = next_due.saturating_duration_since(Instant::now());
    let at = chrono::Duration::from_std(remaining)
        .map(|delta| chrono::Local::now() + delta)
        .unwrap_or_else(|_| chrono::Local::now());
    info!(next_test = %at.format("%Y-%m-%d %H:%M:%S"), "Waiting for next test cycle");
}
