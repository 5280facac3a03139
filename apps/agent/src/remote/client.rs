use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::RemoteService;
use super::types::{
    HeartbeatAck, HeartbeatRequest, IpResponse, LoginRequest, NodeDescriptor, PointsResponse,
    SignupRequest, TokenResponse,
};
use crate::agent::ProxyDescriptor;
use crate::config::ServiceSection;
use crate::monitoring::ProbeResult;

pub const DEFAULT_BASE_URL: &str = "https://pipe-network-backend.pipecanary.workers.dev/api";
pub const DEFAULT_IP_ECHO_URL: &str = "https://api64.ipify.org?format=json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("pipe-agent/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    /// HTTP status of a protocol error, if that is what this is
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Build a single-use HTTP client bound to `proxy`.
///
/// Idle connections are not pooled so every call opens its own connection.
pub(crate) fn http_client(
    timeout: Duration,
    proxy: Option<&ProxyDescriptor>,
    accept_invalid_certs: bool,
) -> Result<Client, ClientError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .user_agent(USER_AGENT);

    if let Some(proxy) = proxy {
        let reqwest_proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|source| {
            ClientError::InvalidProxy { proxy: proxy.to_string(), source }
        })?;
        builder = builder.proxy(reqwest_proxy);
    } else {
        builder = builder.no_proxy();
    }

    Ok(builder.build()?)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(ClientError::Decode)
}

async fn unexpected(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status { status, body }
}

/// HTTP client for the pipe network backend
#[derive(Debug, Clone)]
pub struct ServiceClient {
    base_url: String,
    ip_echo_url: String,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl Default for ServiceClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_IP_ECHO_URL)
    }
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>, ip_echo_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ip_echo_url: ip_echo_url.into(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    pub fn from_config(service: &ServiceSection) -> Self {
        Self::new(&service.base_url, &service.ip_echo_url)
            .with_timeout(Duration::from_secs(service.request_timeout_secs))
            .accept_invalid_certs(service.accept_invalid_certs)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn client(&self, proxy: Option<&ProxyDescriptor>) -> Result<Client, ClientError> {
        http_client(self.timeout, proxy, self.accept_invalid_certs)
    }

    /// Exchange email and password for a session token. Only 200 counts.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<String, ClientError> {
        let response = self
            .client(proxy)?
            .post(self.endpoint("login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        let TokenResponse { token } = decode(response).await?;
        Ok(token)
    }

    /// Register a new account. The backend answers 200 or 201 on success.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        referral_code: Option<&str>,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<String, ClientError> {
        let referral_code = referral_code.map(str::trim).filter(|code| !code.is_empty());
        let response = self
            .client(proxy)?
            .post(self.endpoint("signup"))
            .json(&SignupRequest { email, password, referral_code })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let TokenResponse { token } = decode(response).await?;
                Ok(token)
            }
            _ => Err(unexpected(response).await),
        }
    }
}

#[async_trait]
impl RemoteService for ServiceClient {
    async fn heartbeat(
        &self,
        token: &str,
        ip: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<HeartbeatAck, ClientError> {
        let response = self
            .client(proxy)?
            .post(self.endpoint("heartbeat"))
            .bearer_auth(token)
            .json(&HeartbeatRequest { ip })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(HeartbeatAck::Accepted),
            StatusCode::TOO_MANY_REQUESTS => Ok(HeartbeatAck::RateLimited),
            _ => Err(unexpected(response).await),
        }
    }

    async fn fetch_nodes(
        &self,
        token: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<Vec<NodeDescriptor>, ClientError> {
        let response =
            self.client(proxy)?.get(self.endpoint("nodes")).bearer_auth(token).send().await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        let nodes: Vec<NodeDescriptor> = decode(response).await?;
        debug!(count = nodes.len(), "Fetched node list");
        Ok(nodes)
    }

    async fn report_result(
        &self,
        token: &str,
        result: &ProbeResult,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<(), ClientError> {
        let response = self
            .client(proxy)?
            .post(self.endpoint("test"))
            .bearer_auth(token)
            .json(result)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        Ok(())
    }

    async fn fetch_points(
        &self,
        token: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<f64, ClientError> {
        let response =
            self.client(proxy)?.get(self.endpoint("points")).bearer_auth(token).send().await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        let PointsResponse { points } = decode(response).await?;
        Ok(points)
    }

    async fn resolve_own_ip(&self, proxy: Option<&ProxyDescriptor>) -> Result<String, ClientError> {
        let response = self.client(proxy)?.get(&self.ip_echo_url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected(response).await);
        }
        let IpResponse { ip } = decode(response).await?;
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = ServiceClient::new("http://localhost:8080/api/", DEFAULT_IP_ECHO_URL);
        assert_eq!(client.endpoint("login"), "http://localhost:8080/api/login");
    }

    #[test]
    fn test_invalid_proxy_is_reported() {
        let proxy = ProxyDescriptor::new("http://127.0.0.1:notaport");
        let result = http_client(DEFAULT_TIMEOUT, Some(&proxy), false);
        assert!(matches!(result, Err(ClientError::InvalidProxy { .. })));
    }

    #[test]
    fn test_direct_client_builds() {
        assert!(http_client(DEFAULT_TIMEOUT, None, false).is_ok());
    }
}
