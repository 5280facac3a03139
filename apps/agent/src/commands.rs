use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use pipe_agent::agent::{self, LoadError, ProxyDescriptor, store};
use pipe_agent::config::Config;
use pipe_agent::monitoring::{HttpProber, ProbeTasks, ScheduleConfig, Scheduler, TestCycle};
use pipe_agent::remote::ServiceClient;

use crate::cli::{LoginArgs, SignupArgs};

/// Load accounts and run the scheduler until Ctrl+C.
///
/// Having no usable account is not an error: it is logged and the command
/// returns without starting the scheduler.
pub async fn run(config: &Config) -> Result<()> {
    let entries = match store::load_tokens(&config.files.tokens) {
        Ok(entries) => entries,
        Err(LoadError::Missing(path)) => {
            error!("{} not found, add `token,email` lines to it first", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let proxies = store::load_proxies(&config.files.proxies)?;

    let accounts = agent::build_accounts(entries, &proxies);
    if accounts.is_empty() {
        error!("No usable accounts in {}", config.files.tokens.display());
        return Ok(());
    }
    info!(accounts = accounts.len(), proxies = proxies.len(), "Accounts loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let remote = Arc::new(ServiceClient::from_config(&config.service));
    let mut prober = HttpProber::new(Duration::from_secs(config.probe.timeout_secs))
        .accept_invalid_certs(config.probe.accept_invalid_certs);
    if let Some(max) = config.probe.max_concurrency {
        prober = prober.with_max_concurrency(max);
    }
    let cycle = TestCycle::new(remote.clone(), Arc::new(prober)).with_shutdown(shutdown_rx.clone());
    let tasks = Arc::new(ProbeTasks::new(remote, cycle));
    let scheduler = Scheduler::new(accounts, tasks, ScheduleConfig::from(&config.schedule));

    tokio::spawn(relay_interrupts(shutdown_tx, signal::ctrl_c));

    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Turn the first interrupt into a shutdown request; a second one exits
/// immediately.
///
/// If the listener cannot be installed the sender is kept alive forever so
/// the scheduler keeps running on its timers.
async fn relay_interrupts<F, Fut>(shutdown: watch::Sender<bool>, mut interrupt: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
        return;
    }

    info!("Ctrl+C received, stopping after the current step (press again to force)");
    let _ = shutdown.send(true);

    if interrupt().await.is_ok() {
        warn!("Second Ctrl+C received, exiting now");
        std::process::exit(130);
    }
}

pub async fn login(config: &Config, args: LoginArgs) -> Result<()> {
    let client = ServiceClient::from_config(&config.service);
    let proxies = store::load_proxies(&config.files.proxies)?;

    if args.all {
        return login_all(config, &client, &proxies, args.save).await;
    }

    let (Some(email), Some(password)) = (args.email, args.password) else {
        anyhow::bail!("--email and --password are required without --all");
    };
    let proxy = agent::last_proxy(&proxies);
    if let Some(proxy) = proxy {
        info!(%proxy, "Using proxy");
    }

    let token = client.login(&email, &password, proxy).await.context("Login failed")?;
    println!("{token}");
    save_token(config, &token, &email, args.save)
}

/// Log in every stored credential; a failed account is logged and skipped.
async fn login_all(
    config: &Config,
    client: &ServiceClient,
    proxies: &[ProxyDescriptor],
    save: bool,
) -> Result<()> {
    let credentials = store::load_credentials(&config.files.credentials)?;
    let assigned = agent::assign(&credentials, proxies);

    let mut succeeded = 0;
    for (credential, proxy) in credentials.iter().zip(&assigned) {
        match client.login(&credential.identifier, &credential.password, proxy.as_ref()).await {
            Ok(token) => {
                info!(account = %credential.identifier, "Login succeeded");
                println!("{token},{}", credential.identifier);
                save_token(config, &token, &credential.identifier, save)?;
                succeeded += 1;
            }
            Err(e) => warn!(account = %credential.identifier, error = %e, "Login failed"),
        }
    }

    info!(succeeded, total = credentials.len(), "Batch login finished");
    Ok(())
}

pub async fn signup(config: &Config, args: SignupArgs) -> Result<()> {
    let client = ServiceClient::from_config(&config.service);
    let proxies = store::load_proxies(&config.files.proxies)?;
    let proxy = agent::last_proxy(&proxies);
    if let Some(proxy) = proxy {
        info!(%proxy, "Using proxy");
    }

    let token = client
        .signup(&args.email, &args.password, args.referral_code.as_deref(), proxy)
        .await
        .context("Signup failed")?;
    println!("{token}");
    save_token(config, &token, &args.email, args.save)
}

fn save_token(config: &Config, token: &str, identifier: &str, save: bool) -> Result<()> {
    if !save {
        return Ok(());
    }
    store::append_token(&config.files.tokens, token, identifier)?;
    info!(account = %identifier, "Token saved to {}", config.files.tokens.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_failed_listener_keeps_scheduler_running() {
        let (tx, rx) = watch::channel(false);
        let relay = tokio::spawn(relay_interrupts(tx, || async {
            Err(io::Error::other("signal handling unavailable"))
        }));

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(!*rx.borrow());
        // Sender still alive: the scheduler will not see a closed channel.
        assert!(rx.has_changed().is_ok());
        assert!(!relay.is_finished());
        relay.abort();
    }

    #[tokio::test]
    async fn test_first_interrupt_requests_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let mut calls = 0;
        let relay = tokio::spawn(relay_interrupts(tx, move || {
            calls += 1;
            let first = calls == 1;
            async move {
                if first {
                    Ok(())
                } else {
                    std::future::pending().await
                }
            }
        }));

        rx.changed().await.unwrap();

        assert!(*rx.borrow());
        relay.abort();
    }
}
