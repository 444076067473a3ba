//! Service tables for Docker Compose infrastructure sources.
use serde::Serialize;

use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::InfraPayload;
use clustermap_models::Snapshot;

#[derive(Debug, Serialize)]
struct ServiceRow {
    service: String,
    image: String,
    ports: String,
    depends_on: String,
}

/// Render one service table per Docker Compose source.
///
/// Hosts without compose sources configured get no artifacts at all, not
/// placeholders: the section simply does not exist for them.
pub fn generate(snapshot: &Snapshot) -> Vec<DiagramArtifact> {
    let mut artifacts = Vec::new();
    for source in &snapshot.infra_sources {
        let InfraPayload::DockerCompose(compose) = &source.payload else {
            continue;
        };
        let mut rows: Vec<ServiceRow> = compose
            .services
            .iter()
            .map(|service| ServiceRow {
                service: service.name.clone(),
                image: service.image.clone(),
                ports: service.ports.join(" "),
                depends_on: service.depends_on.join(", "),
            })
            .collect();
        rows.sort_by(|a, b| a.service.cmp(&b.service));

        let content = serde_json::to_string(&rows).expect("service rows must serialise");
        artifacts.push(DiagramArtifact::new(
            format!("compose-{}", source.name),
            format!("Compose: {}", source.name),
            DiagramKind::Table,
            content,
        ));
    }
    artifacts
}
