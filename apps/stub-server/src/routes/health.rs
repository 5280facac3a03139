use actix_web::{HttpResponse, Responder, get, web};

use crate::state::BackendState;

/// Health check route
/// Reports how much the stub currently knows about.
#[get("/")]
pub async fn health_route(state: web::Data<BackendState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "accounts": state.account_count(),
        "nodes": state.nodes().len(),
    }))
}
