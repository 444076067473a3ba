//! Prometheus metrics exposition endpoint.
use actix_web::web::Data;
use actix_web::HttpResponse;
use prometheus::Encoder;
use prometheus::TextEncoder;

/// Expose process metrics in the Prometheus text format.
#[actix_web::get("/metrics")]
pub async fn metrics(registry: Data<prometheus::Registry>) -> HttpResponse {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(error) = encoder.encode(&registry.gather(), &mut buffer) {
        return HttpResponse::InternalServerError().body(error.to_string());
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
