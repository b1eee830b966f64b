// API route configuration

use actix_web::web;

use crate::api::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (authenticated when a secret is configured)
        .service(
            web::scope("/api/v1").route("/reviews", web::get().to(handlers::list_reviews)),
        );
}
