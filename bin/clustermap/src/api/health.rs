//! Service health endpoint.
use actix_web::web::Data;
use actix_web::HttpResponse;

use clustermap_store::SnapshotStore;

/// Report `ok` once any snapshot was published, `initializing` before then.
#[actix_web::get("/api/health")]
pub async fn health(store: Data<SnapshotStore>) -> HttpResponse {
    match store.latest() {
        Some(_) => HttpResponse::Ok().json(serde_json::json!({"status": "ok"})),
        None => crate::api::initializing(),
    }
}
