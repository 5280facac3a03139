use actix_web::web;

pub mod api;
pub mod health;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route).service(api::ip_echo).service(
        web::scope("/api")
            .service(api::login)
            .service(api::signup)
            .service(api::heartbeat)
            .service(api::nodes)
            .service(api::test_result)
            .service(api::points),
    );
}
