//! Deterministic diagram generators over snapshots.
//!
//! Each generator is a pure function from the snapshot (plus freshness cache
//! handles) to one or more artifacts with stable ids. Determinism is a hard
//! requirement: every generator sorts its inputs before rendering, so
//! identical snapshots produce byte-identical artifact contents and the web
//! front-end can diff refreshes cheaply.
use clustermap_fresh::ChartsCache;
use clustermap_fresh::ImagesCache;
use clustermap_fresh::NodesCache;
use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::Snapshot;

mod charts;
mod compose;
mod deps;
mod images;
mod mermaid;
mod nodes;
mod security;
mod topology;

pub use self::deps::layer_of;

/// Read handles on the freshness caches the generators consult.
pub struct FreshnessCaches<'a> {
    pub charts: &'a ChartsCache,
    pub images: &'a ImagesCache,
    pub nodes: &'a NodesCache,
}

/// Render every diagram for a snapshot, in a fixed order.
///
/// The order is part of the read API: artifact positions stay stable across
/// refreshes so the front-end layout does not jump around.
pub fn render_all(snapshot: &Snapshot, caches: &FreshnessCaches<'_>) -> Vec<DiagramArtifact> {
    let mut artifacts = Vec::new();
    artifacts.extend(topology::generate(snapshot));
    artifacts.push(nodes::generate(snapshot, caches.nodes));
    artifacts.push(deps::generate(snapshot));
    artifacts.push(charts::generate(snapshot, caches.charts));
    artifacts.push(images::generate(snapshot, caches.images));
    artifacts.extend(security::generate(snapshot));
    artifacts.extend(compose::generate(snapshot));
    artifacts
}

/// Empty-state placeholder shown while a diagram has nothing to draw.
fn placeholder(id: &str, title: &str, message: &str) -> DiagramArtifact {
    DiagramArtifact::new(id, title, DiagramKind::Markdown, format!("_{}_", message))
}
