//! Node prober against fake nodes on loopback.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{ForwardProxy, closed_address, start_node};
use pipe_agent::ProxyDescriptor;
use pipe_agent::monitoring::types::UNREACHABLE_LATENCY;
use pipe_agent::monitoring::{HttpProber, ProbeStatus, Prober};
use pipe_agent::remote::{NodeDescriptor, NodeId};
use pipe_stub_server::NodeBehavior;

fn node(id: u64, ip: String) -> NodeDescriptor {
    NodeDescriptor { node_id: NodeId::Number(id), ip }
}

#[actix_web::test]
async fn test_reachable_timeout_and_error_status() {
    let fast = start_node(NodeBehavior::Healthy { delay: Duration::from_millis(50) });
    let hung = start_node(NodeBehavior::Hang);
    let failing = start_node(NodeBehavior::Failing { status: 500 });
    let nodes = vec![node(1, fast), node(2, hung), node(3, failing)];

    let prober = HttpProber::new(Duration::from_millis(800));
    let results = prober.probe(&nodes, None).await;

    assert_eq!(results.len(), 3);
    let a = results.iter().find(|r| r.node_id == NodeId::Number(1)).unwrap();
    assert_eq!(a.status, ProbeStatus::Reachable);
    assert!(a.latency >= 50.0 && a.latency < 800.0, "latency was {}", a.latency);

    for id in [2, 3] {
        let r = results.iter().find(|r| r.node_id == NodeId::Number(id)).unwrap();
        assert_eq!(r.status, ProbeStatus::Unreachable);
        assert_eq!(r.latency, UNREACHABLE_LATENCY);
    }
}

#[actix_web::test]
async fn test_one_result_per_node() {
    let healthy = start_node(NodeBehavior::Healthy { delay: Duration::ZERO });
    let nodes: Vec<NodeDescriptor> = (0..12)
        .map(|id| if id % 3 == 0 { node(id, closed_address()) } else { node(id, healthy.clone()) })
        .collect();

    let results = HttpProber::new(Duration::from_secs(2)).probe(&nodes, None).await;

    assert_eq!(results.len(), nodes.len());
    let ids: HashSet<NodeId> = results.iter().map(|r| r.node_id.clone()).collect();
    assert_eq!(ids.len(), nodes.len());
    assert_eq!(results.iter().filter(|r| r.is_reachable()).count(), 8);
}

#[actix_web::test]
async fn test_bounded_concurrency_keeps_every_node() {
    let slow = start_node(NodeBehavior::Healthy { delay: Duration::from_millis(30) });
    let nodes: Vec<NodeDescriptor> = (0..10).map(|id| node(id, slow.clone())).collect();

    let results = HttpProber::new(Duration::from_secs(2))
        .with_max_concurrency(3)
        .probe(&nodes, None)
        .await;

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.is_reachable()));
}

#[actix_web::test]
async fn test_probes_run_concurrently() {
    let slow = start_node(NodeBehavior::Healthy { delay: Duration::from_millis(300) });
    let nodes: Vec<NodeDescriptor> = (0..5).map(|id| node(id, slow.clone())).collect();

    let started = std::time::Instant::now();
    let results = HttpProber::new(Duration::from_secs(3)).probe(&nodes, None).await;

    assert!(results.iter().all(|r| r.is_reachable()));
    // Five sequential probes would need at least 1.5s.
    assert!(started.elapsed() < Duration::from_millis(1200));
}

#[actix_web::test]
async fn test_dead_proxy_marks_every_node_unreachable() {
    let healthy = start_node(NodeBehavior::Healthy { delay: Duration::ZERO });
    let proxy = ProxyDescriptor::new(format!("http://{}", closed_address()));
    let nodes = vec![node(1, healthy.clone()), node(2, healthy)];

    let results = HttpProber::new(Duration::from_secs(2)).probe(&nodes, Some(&proxy)).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == ProbeStatus::Unreachable));
}

#[actix_web::test]
async fn test_invalid_proxy_marks_node_unreachable() {
    let healthy = start_node(NodeBehavior::Healthy { delay: Duration::ZERO });
    let proxy = ProxyDescriptor::new("http://127.0.0.1:notaport");

    let results = HttpProber::default().probe(&[node(1, healthy)], Some(&proxy)).await;

    assert_eq!(results[0].latency, UNREACHABLE_LATENCY);
}

#[actix_web::test]
async fn test_probes_travel_through_the_proxy() {
    let fast = start_node(NodeBehavior::Healthy { delay: Duration::from_millis(50) });
    let hung = start_node(NodeBehavior::Hang);
    let failing = start_node(NodeBehavior::Failing { status: 500 });
    let proxy = ForwardProxy::start();
    let nodes = vec![node(1, fast), node(2, hung), node(3, failing)];

    let results = HttpProber::new(Duration::from_millis(800)).probe(&nodes, Some(&proxy.descriptor())).await;

    assert_eq!(proxy.relayed(), 3);
    assert_eq!(results[0].status, ProbeStatus::Reachable);
    assert!(results[0].latency >= 50.0, "latency was {}", results[0].latency);
    assert_eq!(results[1].latency, UNREACHABLE_LATENCY);
    assert_eq!(results[2].latency, UNREACHABLE_LATENCY);
}
