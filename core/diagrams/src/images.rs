//! Aggregated pod image table with latest same-variant tags.
use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Serialize;

use clustermap_fresh::ImagesCache;
use clustermap_fresh::UNKNOWN;
use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::Snapshot;

#[derive(Debug, Serialize)]
struct ImageRow {
    image: String,
    tag: String,
    init: bool,

    /// Number of distinct namespaces running the image.
    namespaces: usize,

    /// Number of distinct `(namespace, pod)` pairs running the image.
    pods: usize,

    latest: String,
    outdated: bool,
}

/// Render the aggregated pod images table.
pub fn generate(snapshot: &Snapshot, cache: &ImagesCache) -> DiagramArtifact {
    if snapshot.pod_images.is_empty() {
        return crate::placeholder("images", "Images", "No running pod images discovered yet.");
    }

    // Aggregate by `(image, tag, init)`, tracking where the image runs.
    let mut groups: BTreeMap<(String, String, bool), Usage> = BTreeMap::new();
    for pod_image in &snapshot.pod_images {
        let image = format!("{}/{}", pod_image.image.registry, pod_image.image.repository);
        let usage = groups
            .entry((image, pod_image.image.tag.clone(), pod_image.init))
            .or_default();
        usage.namespaces.insert(pod_image.namespace.clone());
        usage
            .pods
            .insert((pod_image.namespace.clone(), pod_image.pod.clone()));
        usage.reference = Some(pod_image.image.clone());
    }

    let rows: Vec<ImageRow> = groups
        .into_iter()
        .map(|((image, tag, init), usage)| {
            let latest = usage
                .reference
                .as_ref()
                .map(|reference| cache.latest(reference))
                .unwrap_or_else(|| UNKNOWN.to_string());
            let outdated = latest != UNKNOWN && latest != tag;
            ImageRow {
                image,
                tag,
                init,
                namespaces: usage.namespaces.len(),
                pods: usage.pods.len(),
                latest,
                outdated,
            }
        })
        .collect();

    let content = serde_json::to_string(&rows).expect("image rows must serialise");
    DiagramArtifact::new("images", "Images", DiagramKind::Table, content)
}

#[derive(Default)]
struct Usage {
    namespaces: HashSet<String>,
    pods: HashSet<(String, String)>,
    reference: Option<clustermap_models::ImageRef>,
}

#[cfg(test)]
mod tests {
    use clustermap_fresh::ImagesCache;
    use clustermap_fresh::RegistryClient;
    use clustermap_models::DiagramKind;
    use clustermap_models::ImageRef;
    use clustermap_models::PodImage;
    use clustermap_models::Snapshot;

    use super::generate;

    fn pod_image(namespace: &str, pod: &str, image: &str, init: bool) -> PodImage {
        PodImage {
            namespace: namespace.into(),
            pod: pod.into(),
            container: "main".into(),
            init,
            image: ImageRef::parse(image),
            image_id: String::new(),
        }
    }

    #[test]
    fn aggregation_counts_distinct_usage() {
        let mut snapshot = Snapshot::default();
        snapshot.pod_images = vec![
            pod_image("media", "web-1", "nginx:1.25", false),
            pod_image("media", "web-2", "nginx:1.25", false),
            pod_image("tools", "proxy-1", "nginx:1.25", false),
            pod_image("tools", "proxy-1", "nginx:1.25", false),
            pod_image("tools", "setup-1", "nginx:1.25", true),
        ];

        let cache = ImagesCache::new(RegistryClient::new().unwrap());
        let artifact = generate(&snapshot, &cache);
        assert_eq!(artifact.kind, DiagramKind::Table);
        let rows: serde_json::Value = serde_json::from_str(&artifact.content).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);

        // Non-init row aggregates three distinct pods across two namespaces.
        let main = rows.iter().find(|row| row["init"] == false).unwrap();
        assert_eq!(main["image"], "docker.io/nginx");
        assert_eq!(main["namespaces"], 2);
        assert_eq!(main["pods"], 3);
        assert_eq!(main["latest"], "-");
        assert_eq!(main["outdated"], false);

        let init = rows.iter().find(|row| row["init"] == true).unwrap();
        assert_eq!(init["pods"], 1);
    }

    #[test]
    fn empty_images_render_placeholder() {
        let cache = ImagesCache::new(RegistryClient::new().unwrap());
        let artifact = generate(&Snapshot::default(), &cache);
        assert_eq!(artifact.kind, DiagramKind::Markdown);
    }
}
