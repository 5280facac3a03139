use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

/// Report status values the backend accepts
pub const ONLINE: &str = "在线";
pub const OFFLINE: &str = "离线";

/// Node entry handed out by `GET /api/nodes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubNode {
    pub node_id: serde_json::Value,
    pub ip: String,
}

impl StubNode {
    pub fn new(node_id: u64, ip: impl Into<String>) -> Self {
        Self { node_id: node_id.into(), ip: ip.into() }
    }
}

/// Body of `POST /api/test`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub node_id: serde_json::Value,
    pub ip: String,
    pub latency: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRecord {
    pub email: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub email: String,
    pub report: TestReport,
}

#[derive(Debug)]
struct StoredAccount {
    password: String,
    referral_code: Option<String>,
    points: f64,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, StoredAccount>,
    sessions: HashMap<String, String>,
    last_heartbeat: HashMap<String, Instant>,
    heartbeats: Vec<HeartbeatRecord>,
    reports: Vec<ReportRecord>,
    nodes: Vec<StubNode>,
    issued: u64,
}

/// In-memory backend shared by all workers
#[derive(Debug, Default)]
pub struct BackendState {
    inner: Mutex<Inner>,
    /// Heartbeats from one token closer together than this get 429
    heartbeat_gap: Option<Duration>,
}

impl BackendState {
    pub fn new(nodes: Vec<StubNode>) -> Self {
        let state = Self::default();
        state.set_nodes(nodes);
        state
    }

    pub fn with_heartbeat_gap(mut self, gap: Duration) -> Self {
        self.heartbeat_gap = Some(gap);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_nodes(&self, nodes: Vec<StubNode>) {
        self.lock().nodes = nodes;
    }

    pub fn nodes(&self) -> Vec<StubNode> {
        self.lock().nodes.clone()
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    /// Register an account without going through the API
    pub fn add_account(&self, email: &str, password: &str) {
        self.lock().accounts.insert(
            email.to_string(),
            StoredAccount { password: password.to_string(), referral_code: None, points: 0.0 },
        );
    }

    fn issue_token(inner: &mut Inner, email: &str) -> String {
        inner.issued += 1;
        let token = format!("stub-{:08x}", inner.issued);
        inner.sessions.insert(token.clone(), email.to_string());
        token
    }

    pub fn signup(
        &self,
        email: &str,
        password: &str,
        referral_code: Option<String>,
    ) -> Result<String, ApiError> {
        let mut inner = self.lock();
        if inner.accounts.contains_key(email) {
            return Err(ApiError::AccountExists);
        }
        inner.accounts.insert(
            email.to_string(),
            StoredAccount { password: password.to_string(), referral_code, points: 0.0 },
        );
        Ok(Self::issue_token(&mut inner, email))
    }

    pub fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let mut inner = self.lock();
        let valid = inner.accounts.get(email).is_some_and(|account| account.password == password);
        if !valid {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(Self::issue_token(&mut inner, email))
    }

    pub fn referral_code(&self, email: &str) -> Option<String> {
        self.lock().accounts.get(email).and_then(|a| a.referral_code.clone())
    }

    /// Email behind a session token
    pub fn authenticate(&self, token: &str) -> Result<String, ApiError> {
        self.lock().sessions.get(token).cloned().ok_or(ApiError::Unauthorized)
    }

    pub fn heartbeat(&self, token: &str, ip: &str) -> Result<(), ApiError> {
        let email = self.authenticate(token)?;
        let mut inner = self.lock();
        let now = Instant::now();

        if let (Some(gap), Some(last)) = (self.heartbeat_gap, inner.last_heartbeat.get(token)) {
            if now.duration_since(*last) < gap {
                debug!(%email, "Heartbeat rate limited");
                return Err(ApiError::RateLimited);
            }
        }

        inner.last_heartbeat.insert(token.to_string(), now);
        inner.heartbeats.push(HeartbeatRecord { email, ip: ip.to_string() });
        Ok(())
    }

    /// Store a report; every online node is worth one point
    pub fn record_report(&self, token: &str, report: TestReport) -> Result<(), ApiError> {
        let email = self.authenticate(token)?;
        let mut inner = self.lock();

        if report.status == ONLINE {
            if let Some(account) = inner.accounts.get_mut(&email) {
                account.points += 1.0;
            }
        }
        inner.reports.push(ReportRecord { email, report });
        Ok(())
    }

    pub fn points(&self, token: &str) -> Result<f64, ApiError> {
        let email = self.authenticate(token)?;
        Ok(self.lock().accounts.get(&email).map(|a| a.points).unwrap_or_default())
    }

    pub fn heartbeats(&self) -> Vec<HeartbeatRecord> {
        self.lock().heartbeats.clone()
    }

    pub fn reports(&self) -> Vec<ReportRecord> {
        self.lock().reports.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_then_login() {
        let state = BackendState::default();
        let first = state.signup("a@b.c", "pw", Some("REF".into())).unwrap();
        assert_eq!(state.signup("a@b.c", "pw", None), Err(ApiError::AccountExists));

        let second = state.login("a@b.c", "pw").unwrap();
        assert_ne!(first, second);
        assert_eq!(state.authenticate(&second).unwrap(), "a@b.c");
        assert_eq!(state.referral_code("a@b.c").as_deref(), Some("REF"));
        assert_eq!(state.login("a@b.c", "nope"), Err(ApiError::InvalidCredentials));
    }

    #[test]
    fn test_heartbeat_gap() {
        let state = BackendState::default().with_heartbeat_gap(Duration::from_secs(60));
        state.add_account("a@b.c", "pw");
        let token = state.login("a@b.c", "pw").unwrap();

        assert!(state.heartbeat(&token, "1.1.1.1").is_ok());
        assert_eq!(state.heartbeat(&token, "1.1.1.1"), Err(ApiError::RateLimited));
        assert_eq!(state.heartbeats().len(), 1);
        assert_eq!(state.heartbeat("bogus", "1.1.1.1"), Err(ApiError::Unauthorized));
    }

    #[test]
    fn test_online_reports_earn_points() {
        let state = BackendState::default();
        state.add_account("a@b.c", "pw");
        let token = state.login("a@b.c", "pw").unwrap();

        for status in [ONLINE, OFFLINE, ONLINE] {
            let report = TestReport {
                node_id: 1.into(),
                ip: "10.0.0.1".into(),
                latency: 1.0,
                status: status.into(),
            };
            state.record_report(&token, report).unwrap();
        }

        assert_eq!(state.points(&token).unwrap(), 2.0);
        assert_eq!(state.reports().len(), 3);
    }
}
