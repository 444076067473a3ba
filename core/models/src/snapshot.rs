//! The snapshot assembled by one refresh cycle.
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use super::ClientTrafficPolicy;
use super::DiagramArtifact;
use super::EastWestGateway;
use super::Gateway;
use super::HelmRelease;
use super::HelmRepository;
use super::HttpRoute;
use super::InfraSource;
use super::Kustomization;
use super::LoadBalancer;
use super::NamespaceRecord;
use super::Node;
use super::PodImage;
use super::SecurityPolicy;
use super::ServiceEntry;

/// All records collected by one refresh cycle.
///
/// The primary cluster populates every sequence. Secondary clusters contribute
/// their reduced subset (namespaces, security policies and workload
/// deployments), each row tagged with the cluster it came from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the primary cluster the snapshot was collected from.
    pub cluster: String,

    pub nodes: Vec<Node>,
    pub kustomizations: Vec<Kustomization>,
    pub helm_releases: Vec<HelmRelease>,
    pub helm_repositories: Vec<HelmRepository>,
    pub pod_images: Vec<PodImage>,
    pub gateways: Vec<Gateway>,
    pub routes: Vec<HttpRoute>,
    pub namespaces: Vec<NamespaceRecord>,
    pub security_policies: Vec<SecurityPolicy>,
    pub client_traffic_policies: Vec<ClientTrafficPolicy>,
    pub service_entries: Vec<ServiceEntry>,
    pub east_west_gateways: Vec<EastWestGateway>,
    pub load_balancers: Vec<LoadBalancer>,
    pub infra_sources: Vec<InfraSource>,
}

impl Snapshot {
    /// Names of every cluster contributing records to the snapshot.
    ///
    /// The primary cluster is always first; secondary clusters follow in the
    /// order their records appear.
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names = vec![self.cluster.clone()];
        for namespace in &self.namespaces {
            if !names.contains(&namespace.cluster) {
                names.push(namespace.cluster.clone());
            }
        }
        for kustomization in &self.kustomizations {
            if !names.contains(&kustomization.cluster) {
                names.push(kustomization.cluster.clone());
            }
        }
        names
    }
}

/// The atomic publication unit: a snapshot plus the artifacts rendered from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Published {
    pub snapshot: Snapshot,
    pub diagrams: Vec<DiagramArtifact>,

    /// When the refresh cycle producing this result completed.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::Snapshot;
    use crate::Kustomization;
    use crate::NamespaceRecord;

    #[test]
    fn cluster_names_primary_first() {
        let mut snapshot = Snapshot {
            cluster: "Homelab".into(),
            ..Snapshot::default()
        };
        snapshot.namespaces.push(NamespaceRecord {
            cluster: "NAS".into(),
            name: "minio".into(),
        });
        snapshot.kustomizations.push(Kustomization {
            cluster: "NAS".into(),
            name: "minio".into(),
            ..Kustomization::default()
        });
        assert_eq!(snapshot.cluster_names(), vec!["Homelab", "NAS"]);
    }
}
