//! Fake probe targets.

use std::io;
use std::net::TcpListener;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, rt, web};

/// How a fake node answers every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBehavior {
    /// 200 after `delay`
    Healthy { delay: Duration },
    /// Never answers within any sensible timeout
    Hang,
    /// Answers immediately with `status`
    Failing { status: u16 },
}

async fn respond(behavior: web::Data<NodeBehavior>) -> HttpResponse {
    match *behavior.get_ref() {
        NodeBehavior::Healthy { delay } => {
            rt::time::sleep(delay).await;
            HttpResponse::Ok().body("ok")
        }
        NodeBehavior::Hang => {
            rt::time::sleep(Duration::from_secs(3600)).await;
            HttpResponse::Ok().finish()
        }
        NodeBehavior::Failing { status } => {
            HttpResponse::build(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
                .finish()
        }
    }
}

/// Serve a fake node on `listener`. The returned server must be spawned.
pub fn serve_node(listener: TcpListener, behavior: NodeBehavior) -> io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new().app_data(web::Data::new(behavior)).default_service(web::to(respond))
    })
    .workers(1)
    .listen(listener)?
    .run();

    Ok(server)
}
