//! API endpoints serving the pre-rendered diagrams.
use actix_web::web::Data;
use actix_web::web::Path;
use actix_web::HttpResponse;
use time::format_description::well_known::Rfc3339;

use clustermap_store::SnapshotStore;

/// List every diagram of the latest published snapshot.
#[actix_web::get("/api/diagrams")]
pub async fn list(store: Data<SnapshotStore>) -> HttpResponse {
    let published = match store.latest() {
        Some(published) => published,
        None => return crate::api::initializing(),
    };
    let generated_at = published
        .generated_at
        .format(&Rfc3339)
        .unwrap_or_default();
    HttpResponse::Ok().json(serde_json::json!({
        "diagrams": published.diagrams,
        "generated_at": generated_at,
    }))
}

/// Get one diagram of the latest published snapshot by id.
#[actix_web::get("/api/diagrams/{id}")]
pub async fn get(store: Data<SnapshotStore>, path: Path<String>) -> HttpResponse {
    let published = match store.latest() {
        Some(published) => published,
        None => return crate::api::initializing(),
    };
    let id = path.into_inner();
    let artifact = published
        .diagrams
        .iter()
        .find(|artifact| artifact.id == id);
    match artifact {
        None => crate::api::not_found(),
        Some(artifact) => HttpResponse::Ok().json(artifact),
    }
}
