#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use actix_web::{rt, web};
use dotenvy::dotenv;
use tracing::info;

use pipe_stub_server::error::AppError;
use pipe_stub_server::{BackendState, NodeBehavior, StubNode, serve, serve_node};

fn get_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(val) => val.parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    logger::init_tracing();

    let bind: String = get_env_var("BIND", "127.0.0.1".to_string());
    let port: u16 = get_env_var("PORT", 8080);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    // STUB_NODES="1.2.3.4,5.6.7.8:8080"; without it one healthy local node is served.
    let advertised: String = get_env_var("STUB_NODES", String::new());
    let mut nodes: Vec<StubNode> = advertised
        .split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .zip(1..)
        .map(|(ip, id)| StubNode::new(id, ip))
        .collect();

    if nodes.is_empty() {
        let listener = TcpListener::bind((addr.ip(), 0))?;
        let node_addr = listener.local_addr()?;
        rt::spawn(serve_node(listener, NodeBehavior::Healthy { delay: Duration::from_millis(20) })?);
        info!("Serving local fake node on {node_addr}");
        nodes.push(StubNode::new(1, node_addr.to_string()));
    }

    let mut state = BackendState::new(nodes);
    let gap: u64 = get_env_var("STUB_HEARTBEAT_GAP_SECS", 0);
    if gap > 0 {
        state = state.with_heartbeat_gap(Duration::from_secs(gap));
    }

    // STUB_ACCOUNTS="alice@example.com:secret,bob@example.com:hunter2"
    let seeded: String = get_env_var("STUB_ACCOUNTS", String::new());
    for (email, password) in seeded.split(',').filter_map(|pair| pair.trim().split_once(':')) {
        state.add_account(email, password);
    }

    info!("Stub backend listening on http://{addr}/api");
    serve(TcpListener::bind(addr)?, web::Data::new(state))?.await?;

    Ok(())
}
