//! Backend endpoints, mounted under `/api`.

use actix_web::{HttpRequest, HttpResponse, get, http::header, post, web};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::{BackendState, TestReport};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    #[serde(rename = "referralCode")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
    pub ip: String,
}

fn bearer_token(req: &HttpRequest) -> Result<&str, ApiError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

#[post("/login")]
pub async fn login(
    state: web::Data<BackendState>,
    body: web::Json<LoginBody>,
) -> Result<HttpResponse, ApiError> {
    let token = state.login(&body.email, &body.password)?;
    info!(email = %body.email, "Login");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token })))
}

#[post("/signup")]
pub async fn signup(
    state: web::Data<BackendState>,
    body: web::Json<SignupBody>,
) -> Result<HttpResponse, ApiError> {
    let SignupBody { email, password, referral_code } = body.into_inner();
    let token = state.signup(&email, &password, referral_code)?;
    info!(%email, "Signup");
    Ok(HttpResponse::Created().json(serde_json::json!({ "token": token })))
}

#[post("/heartbeat")]
pub async fn heartbeat(
    req: HttpRequest,
    state: web::Data<BackendState>,
    body: web::Json<HeartbeatBody>,
) -> Result<HttpResponse, ApiError> {
    state.heartbeat(bearer_token(&req)?, &body.ip)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}

#[get("/nodes")]
pub async fn nodes(req: HttpRequest, state: web::Data<BackendState>) -> Result<HttpResponse, ApiError> {
    state.authenticate(bearer_token(&req)?)?;
    Ok(HttpResponse::Ok().json(state.nodes()))
}

#[post("/test")]
pub async fn test_result(
    req: HttpRequest,
    state: web::Data<BackendState>,
    body: web::Json<TestReport>,
) -> Result<HttpResponse, ApiError> {
    state.record_report(bearer_token(&req)?, body.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}

#[get("/points")]
pub async fn points(req: HttpRequest, state: web::Data<BackendState>) -> Result<HttpResponse, ApiError> {
    let points = state.points(bearer_token(&req)?)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "points": points })))
}

/// Stand-in for the public "what is my IP" service
#[get("/ip")]
pub async fn ip_echo(req: HttpRequest) -> HttpResponse {
    let ip = req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_default();
    HttpResponse::Ok().json(serde_json::json!({ "ip": ip }))
}
