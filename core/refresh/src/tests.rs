use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use clustermap_context::Context;
use clustermap_fresh::ChartsCache;
use clustermap_fresh::GithubClient;
use clustermap_fresh::ImagesCache;
use clustermap_fresh::NodesCache;
use clustermap_fresh::RegistryClient;
use clustermap_models::DiagramKind;
use clustermap_source_file::FileKind;
use clustermap_source_kube::api;
use clustermap_source_kube::ClusterSource;
use clustermap_source_kube::FixtureApi;
use clustermap_store::SnapshotStore;

use super::FileSpec;
use super::RefreshOutcome;
use super::Refresher;
use super::RefresherSetup;

fn refresher(primary: FixtureApi, secondaries: Vec<(&str, FixtureApi)>) -> Refresher {
    refresher_with_files(primary, secondaries, Vec::new())
}

fn refresher_with_files(
    primary: FixtureApi,
    secondaries: Vec<(&str, FixtureApi)>,
    files: Vec<FileSpec>,
) -> Refresher {
    let interval = Duration::from_secs(300);
    Refresher::new(RefresherSetup {
        charts: ChartsCache::new(RegistryClient::new().unwrap(), String::new(), interval),
        files,
        images: ImagesCache::new(RegistryClient::new().unwrap()),
        interval,
        nodes: NodesCache::new(GithubClient::new().unwrap()),
        primary: ClusterSource::new("Homelab", Arc::new(primary)),
        secondaries: secondaries
            .into_iter()
            .map(|(name, api)| ClusterSource::new(name, Arc::new(api)))
            .collect(),
        store: SnapshotStore::new(),
    })
}

fn store(refresher: &Refresher) -> SnapshotStore {
    refresher.inner.store.clone()
}

// An entirely empty primary cluster still publishes a well-formed result
// with empty-state placeholders.
#[tokio::test]
async fn empty_cluster_publishes_placeholders() {
    let refresher = refresher(FixtureApi::new(), Vec::new());
    let context = Context::fixture();
    let outcome = refresher.refresh(&context).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Completed);

    let published = store(&refresher).latest().expect("snapshot expected");
    assert_eq!(published.snapshot.cluster, "Homelab");
    assert!(published
        .diagrams
        .iter()
        .any(|artifact| artifact.id == "dependencies" && artifact.kind == DiagramKind::Markdown));

    // The published unit serialises to the shape the read API returns.
    let body = serde_json::to_value(&*published).unwrap();
    assert!(body["diagrams"].is_array());
    assert!(body["generated_at"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refresh_is_single_flight() {
    let mut api = FixtureApi::new();
    api.delay = Some(Duration::from_millis(100));
    let refresher = refresher(api, Vec::new());
    let context = Context::fixture();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let refresher = refresher.clone();
        let context = context.clone();
        handles.push(tokio::spawn(async move {
            refresher.refresh(&context).await.unwrap()
        }));
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let completed = outcomes
        .iter()
        .filter(|outcome| **outcome == RefreshOutcome::Completed)
        .count();
    let dropped = outcomes
        .iter()
        .filter(|outcome| **outcome == RefreshOutcome::AlreadyRunning)
        .count();
    assert_eq!(completed, 1);
    assert_eq!(dropped, 4);
}

#[tokio::test]
async fn unavailable_primary_publishes_nothing() {
    let refresher = refresher(FixtureApi::unreachable(), Vec::new());
    let context = Context::fixture();
    let outcome = refresher.refresh(&context).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::PrimaryUnavailable);
    assert!(store(&refresher).latest().is_none());
}

#[tokio::test]
async fn secondary_failure_degrades_only() {
    let refresher = refresher(
        FixtureApi::new(),
        vec![("NAS", FixtureApi::unreachable())],
    );
    let context = Context::fixture();
    let outcome = refresher.refresh(&context).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Completed);

    let published = store(&refresher).latest().unwrap();
    assert!(published
        .snapshot
        .namespaces
        .iter()
        .all(|namespace| namespace.cluster == "Homelab"));
}

#[tokio::test]
async fn secondary_rows_appended_in_sorted_order() {
    let beta = FixtureApi::new().with_objects(
        &api::NAMESPACES,
        vec![
            json!({"metadata": {"name": "zeta"}}),
            json!({"metadata": {"name": "alpha"}}),
        ],
    );
    let alpha = FixtureApi::new()
        .with_objects(&api::NAMESPACES, vec![json!({"metadata": {"name": "media"}})]);
    // Configuration order deliberately disagrees with name order.
    let refresher = refresher(FixtureApi::new(), vec![("Zware", beta), ("Anders", alpha)]);
    let context = Context::fixture();
    refresher.refresh(&context).await.unwrap();

    let published = store(&refresher).latest().unwrap();
    let rows: Vec<(String, String)> = published
        .snapshot
        .namespaces
        .iter()
        .map(|namespace| (namespace.cluster.clone(), namespace.name.clone()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Anders".to_string(), "media".to_string()),
            ("Zware".to_string(), "alpha".to_string()),
            ("Zware".to_string(), "zeta".to_string()),
        ],
    );
}

// Identical inputs refresh into byte-identical artifact contents.
#[tokio::test]
async fn refresh_is_deterministic() {
    fn seeded() -> FixtureApi {
        FixtureApi::new().with_objects(
            &api::KUSTOMIZATIONS,
            vec![
                json!({
                    "metadata": {"name": "crds", "namespace": "flux-system"},
                    "spec": {"path": "./k8s/c1/crds"}
                }),
                json!({
                    "metadata": {"name": "apps", "namespace": "flux-system"},
                    "spec": {"path": "./k8s/c1/apps", "dependsOn": [{"name": "crds"}]}
                }),
            ],
        )
    }

    let context = Context::fixture();
    let first = refresher(seeded(), Vec::new());
    first.refresh(&context).await.unwrap();
    let second = refresher(seeded(), Vec::new());
    second.refresh(&context).await.unwrap();

    let first = store(&first).latest().unwrap();
    let second = store(&second).latest().unwrap();
    assert_eq!(first.diagrams.len(), second.diagrams.len());
    for (a, b) in first.diagrams.iter().zip(second.diagrams.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.content, b.content);
    }
}

#[tokio::test]
async fn infrastructure_files_merged() {
    let path = std::env::temp_dir().join("clustermap-refresh-tfstate-test.json");
    let state = r#"{
        "resources": [{
            "mode": "managed",
            "type": "proxmox_vm_qemu",
            "name": "worker",
            "instances": [{"attributes": {"name": "talos-worker-1", "cores": 8, "memory": 16384}}]
        }]
    }"#;
    tokio::fs::write(&path, state).await.unwrap();

    let files = vec![
        FileSpec {
            name: "proxmox".into(),
            kind: FileKind::Tfstate,
            path: path.to_str().unwrap().into(),
        },
        FileSpec {
            name: "gone".into(),
            kind: FileKind::Tfstate,
            path: "/no/such/file.tfstate".into(),
        },
    ];
    let refresher = refresher_with_files(FixtureApi::new(), Vec::new(), files);
    let context = Context::fixture();
    let outcome = refresher.refresh(&context).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Completed);

    let published = store(&refresher).latest().unwrap();
    assert_eq!(published.snapshot.infra_sources.len(), 1);
    assert_eq!(published.snapshot.infra_sources[0].name, "proxmox");
    assert!(published
        .diagrams
        .iter()
        .any(|artifact| artifact.id == "topology-proxmox"));
}

#[tokio::test]
async fn shutdown_aborts_without_publishing() {
    let refresher = refresher(FixtureApi::new(), Vec::new());
    let context = Context::fixture();
    context.cancel.cancel();
    let result = refresher.refresh(&context).await;
    assert!(result.is_err());
    assert!(store(&refresher).latest().is_none());
}
