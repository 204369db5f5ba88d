use actix_web::web;

pub mod handlers;

// ============================================================================
// HTTP Surface
// ============================================================================

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            // Literal route first so "me" never parses as an order id.
            .route("/me", web::get().to(handlers::list_my_orders))
            .route("", web::post().to(handlers::create_order))
            .route("/{id}", web::get().to(handlers::get_order)),
    )
    .service(
        web::scope("/payments")
            .route("/intent", web::post().to(handlers::create_intent))
            .route("/webhook", web::post().to(handlers::webhook)),
    )
    .route("/health", web::get().to(handlers::health))
    .route("/metrics", web::get().to(handlers::metrics));
}
