use std::fmt;

use url::Url;

/// Outbound proxy address as read from the proxy list.
///
/// The address is opaque to the agent; reqwest interprets the scheme
/// (`http`, `https`, `socks5`, `socks5h`) and any embedded credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyDescriptor(String);

impl ProxyDescriptor {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Masks the password part so proxies can be logged.
impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Url::parse(&self.0) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                write!(f, "{url}")
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Pair accounts with proxies index-for-index.
///
/// Entry `i` of the returned vector is the proxy for `accounts[i]`. When the
/// pool is shorter than the account list the trailing accounts get `None`
/// and connect directly.
pub fn assign<A>(accounts: &[A], proxies: &[ProxyDescriptor]) -> Vec<Option<ProxyDescriptor>> {
    (0..accounts.len()).map(|index| proxies.get(index).cloned()).collect()
}

/// Proxy used for one-off login and signup calls: the last entry of the list.
pub fn last_proxy(proxies: &[ProxyDescriptor]) -> Option<&ProxyDescriptor> {
    proxies.last()
}
