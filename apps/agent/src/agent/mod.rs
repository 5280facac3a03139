//! Accounts, their proxies, and the files they are loaded from.

pub mod proxy;
pub mod store;

pub use proxy::{ProxyDescriptor, assign, last_proxy};
pub use store::{Credential, LoadError, TokenEntry};

/// One account the agent runs for. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub identifier: String,
    pub token: String,
    pub proxy: Option<ProxyDescriptor>,
}

/// Build the run's account list, binding proxies index-for-index.
pub fn build_accounts(entries: Vec<TokenEntry>, proxies: &[ProxyDescriptor]) -> Vec<Account> {
    let assigned = assign(&entries, proxies);
    entries
        .into_iter()
        .zip(assigned)
        .map(|(entry, proxy)| Account { identifier: entry.identifier, token: entry.token, proxy })
        .collect()
}
