//! Shared helpers: start the stub backend and fake nodes on loopback ports.

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actix_web::http::{StatusCode, header};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, rt, web};
use pipe_agent::ProxyDescriptor;
use pipe_agent::ServiceClient;
use pipe_stub_server::{BackendState, NodeBehavior, serve, serve_node};

pub struct StubBackend {
    pub state: web::Data<BackendState>,
    pub base: String,
}

impl StubBackend {
    pub fn start(state: BackendState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = web::Data::new(state);
        rt::spawn(serve(listener, state.clone()).unwrap());
        Self { state, base }
    }

    pub fn client(&self) -> ServiceClient {
        ServiceClient::new(format!("{}/api", self.base), format!("{}/ip", self.base))
            .with_timeout(Duration::from_secs(5))
    }

    /// Seed an account and log it in directly against the state
    pub fn session(&self, email: &str) -> String {
        self.state.add_account(email, "secret");
        self.state.login(email, "secret").unwrap()
    }
}

/// Start a fake node and return its `host:port`
pub fn start_node(behavior: NodeBehavior) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    rt::spawn(serve_node(listener, behavior).unwrap());
    address
}

/// A loopback address nothing listens on
pub fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Plain HTTP forward proxy on loopback that counts what it relays
pub struct ForwardProxy {
    pub address: String,
    relayed: web::Data<AtomicUsize>,
}

impl ForwardProxy {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let relayed = web::Data::new(AtomicUsize::new(0));

        let data = relayed.clone();
        let server = HttpServer::new(move || App::new().app_data(data.clone()).default_service(web::to(relay)))
            .workers(1)
            .listen(listener)
            .unwrap()
            .run();
        rt::spawn(server);

        Self { address, relayed }
    }

    pub fn descriptor(&self) -> ProxyDescriptor {
        ProxyDescriptor::new(format!("http://{}", self.address))
    }

    pub fn relayed(&self) -> usize {
        self.relayed.load(Ordering::SeqCst)
    }
}

/// Headers the proxy sets itself instead of copying
const HOP_BY_HOP: [&str; 6] =
    ["host", "connection", "proxy-connection", "keep-alive", "content-length", "transfer-encoding"];

/// Forward the request to the host named in its `Host` header
async fn relay(req: HttpRequest, body: web::Bytes, relayed: web::Data<AtomicUsize>) -> HttpResponse {
    relayed.fetch_add(1, Ordering::SeqCst);

    let Some(host) = req.headers().get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return HttpResponse::BadRequest().finish();
    };
    let path = req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let target = format!("http://{host}{path}");

    let upstream = reqwest::Client::builder().no_proxy().timeout(Duration::from_secs(10)).build().unwrap();
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes()).unwrap();
    let mut outbound = upstream.request(method, target).body(body.to_vec());
    for (name, value) in req.headers() {
        if !HOP_BY_HOP.contains(&name.as_str()) {
            outbound = outbound.header(name.as_str(), value.as_bytes());
        }
    }

    match outbound.send().await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await.unwrap_or_default();
            let mut reply = HttpResponse::build(status);
            if let Some(content_type) = content_type {
                reply.insert_header((header::CONTENT_TYPE, content_type));
            }
            reply.body(bytes.to_vec())
        }
        Err(_) => HttpResponse::BadGateway().finish(),
    }
}
