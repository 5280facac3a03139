use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::prober::Prober;
use crate::agent::Account;
use crate::remote::RemoteService;

/// Summary of one account's test cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// False when the node list could not be fetched and nothing else ran
    pub nodes_fetched: bool,
    pub nodes: usize,
    pub reachable: usize,
    /// Reports the backend accepted
    pub reported: usize,
    pub points: Option<f64>,
    /// Shutdown was observed before the cycle finished
    pub interrupted: bool,
}

/// Runs fetch nodes → probe → report → fetch points for one account
pub struct TestCycle {
    remote: Arc<dyn RemoteService>,
    prober: Arc<dyn Prober>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl TestCycle {
    pub fn new(remote: Arc<dyn RemoteService>, prober: Arc<dyn Prober>) -> Self {
        Self { remote, prober, shutdown: None }
    }

    /// Stop between network calls once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn stopping(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|shutdown| *shutdown.borrow())
    }

    /// Run a full cycle. Failures end this account's cycle early but are
    /// never returned to the caller.
    ///
    /// Shutdown is checked before probing, before each report and before
    /// the points fetch. A call already in flight is left to finish.
    pub async fn run(&self, account: &Account) -> CycleOutcome {
        let proxy = account.proxy.as_ref();
        let mut outcome = CycleOutcome::default();

        match proxy {
            Some(proxy) => info!(account = %account.identifier, %proxy, "Testing nodes through proxy"),
            None => info!(account = %account.identifier, "Testing nodes over direct connection"),
        }

        let nodes = match self.remote.fetch_nodes(&account.token, proxy).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(account = %account.identifier, error = %e, "Failed to fetch node list, skipping cycle");
                return outcome;
            }
        };
        outcome.nodes_fetched = true;
        outcome.nodes = nodes.len();

        if self.stopping() {
            return interrupted(outcome, account);
        }

        let results = self.prober.probe(&nodes, proxy).await;
        outcome.reachable = results.iter().filter(|r| r.is_reachable()).count();

        // Reports go out one at a time, in prober order.
        for result in &results {
            if self.stopping() {
                return interrupted(outcome, account);
            }
            match self.remote.report_result(&account.token, result, proxy).await {
                Ok(()) => outcome.reported += 1,
                Err(e) => {
                    debug!(account = %account.identifier, node_id = %result.node_id, error = %e, "Result report dropped")
                }
            }
        }

        if self.stopping() {
            return interrupted(outcome, account);
        }

        match self.remote.fetch_points(&account.token, proxy).await {
            Ok(points) => {
                info!(
                    account = %account.identifier,
                    points,
                    nodes = outcome.nodes,
                    reachable = outcome.reachable,
                    "Test cycle complete"
                );
                outcome.points = Some(points);
            }
            Err(e) => {
                warn!(account = %account.identifier, error = %e, "Failed to fetch points");
            }
        }

        outcome
    }
}

fn interrupted(mut outcome: CycleOutcome, account: &Account) -> CycleOutcome {
    info!(account = %account.identifier, reported = outcome.reported, "Test cycle interrupted by shutdown");
    outcome.interrupted = true;
    outcome
}
