//! In-memory stand-in for the pipe network backend.
//!
//! Implements login, signup, heartbeat, nodes, test and points under `/api`,
//! an IP echo at `/ip`, and fake nodes to probe. Used by the agent's
//! integration tests and for local dry runs.

use std::io;
use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};

pub mod error;
pub mod node;
pub mod routes;
pub mod state;

pub use node::{NodeBehavior, serve_node};
pub use state::{BackendState, StubNode};

/// Serve the backend on `listener`. The returned server must be spawned.
pub fn serve(listener: TcpListener, state: web::Data<BackendState>) -> io::Result<Server> {
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .workers(2)
        .listen(listener)?
        .run();

    Ok(server)
}
