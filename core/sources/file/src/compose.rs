//! Parse Docker Compose manifests into service records.
use anyhow::Result;
use serde_yaml::Value as Yaml;

use clustermap_models::ComposeFile;
use clustermap_models::DockerService;

/// Parse a Docker Compose manifest into the service records the diagrams use.
///
/// `depends_on` is accepted in both its list form and its map form
/// (`service: {condition: ...}`).
pub fn parse_compose(raw: &str) -> Result<ComposeFile> {
    let document: Yaml = serde_yaml::from_str(raw)?;
    let mut services = Vec::new();

    let entries = document
        .get("services")
        .and_then(Yaml::as_mapping)
        .cloned()
        .unwrap_or_default();
    for (name, definition) in entries {
        let name = match name.as_str() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let image = definition
            .get("image")
            .and_then(Yaml::as_str)
            .unwrap_or("")
            .to_string();
        let ports = definition
            .get("ports")
            .and_then(Yaml::as_sequence)
            .map(|ports| {
                ports
                    .iter()
                    .filter_map(|port| match port {
                        Yaml::String(port) => Some(port.clone()),
                        Yaml::Number(port) => Some(port.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let depends_on = depends_on(&definition);
        services.push(DockerService {
            name,
            image,
            ports,
            depends_on,
        });
    }

    services.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ComposeFile { services })
}

fn depends_on(definition: &Yaml) -> Vec<String> {
    let mut names = match definition.get("depends_on") {
        Some(Yaml::Sequence(entries)) => entries
            .iter()
            .filter_map(Yaml::as_str)
            .map(String::from)
            .collect(),
        Some(Yaml::Mapping(entries)) => entries
            .keys()
            .filter_map(Yaml::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    names.sort();
    names
}
