//! Read-only HTTP API over the published snapshot.
use actix_web::web::ServiceConfig;
use actix_web::HttpResponse;

pub mod diagrams;
pub mod health;
pub mod metrics;


/// Service Unavailable (503) response used until the first snapshot exists.
#[inline]
pub fn initializing() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(serde_json::json!({"status": "initializing"}))
}

/// Not Found (404) API response, commonly for non-existing records.
#[inline]
pub fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({}))
}

/// Configure an HTTP Server with all endpoints in this API module.
///
/// The snapshot store and the metrics registry must be registered as app data
/// by the caller.
pub fn configure(config: &mut ServiceConfig) {
    config
        .service(self::diagrams::list)
        .service(self::diagrams::get)
        .service(self::health::health)
        .service(self::metrics::metrics);
}
