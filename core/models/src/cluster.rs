//! Records collected from Kubernetes clusters.
use serde::Deserialize;
use serde::Serialize;

/// A Kubernetes node with the attributes the diagrams report on.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,

    /// Roles from `node-role.kubernetes.io/*` labels.
    pub roles: Vec<String>,

    pub architecture: String,
    pub os_image: String,
    pub kernel_version: String,
    pub kubelet_version: String,
    pub internal_ip: String,

    /// CPU capacity, as reported by the node status (e.g. `"4"`).
    pub cpu: String,

    /// Memory capacity, as reported by the node status (e.g. `"16107588Ki"`).
    pub memory: String,
}

/// A declaratively managed deployment unit with an explicit dependency list.
///
/// `(cluster, name)` is unique across the snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Kustomization {
    pub cluster: String,
    pub name: String,
    pub namespace: String,

    /// Repository path the deployment is reconciled from.
    pub path: String,

    /// Names of sibling deployments in the same cluster this one depends on.
    pub depends_on: Vec<String>,
}

/// A deployed Helm chart release.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HelmRelease {
    pub cluster: String,
    pub namespace: String,
    pub name: String,

    pub chart: String,

    /// Deployed chart version.
    pub version: String,

    /// Application version packaged by the deployed chart revision.
    pub app_version: String,

    /// Chart source reference, resolved within the same cluster.
    pub source_name: String,
    pub source_namespace: String,
}

/// A source of Helm charts.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HelmRepository {
    pub cluster: String,
    pub namespace: String,
    pub name: String,

    pub url: String,
    pub kind: RepositoryKind,
}

/// The protocol a Helm repository is served over.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// An OCI registry repository.
    Oci,

    /// A classic HTTP repository serving an `index.yaml`.
    #[default]
    Default,
}

/// A container image running in a pod.
///
/// Pods in a terminal phase (`Succeeded`, `Failed`) are excluded at collection.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PodImage {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub init: bool,

    pub image: ImageRef,
    pub image_id: String,
}

/// A canonicalised container image reference.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Canonicalise an image string into `(registry, repository, tag)`.
    ///
    /// References without a registry host default to `docker.io`, references
    /// without a tag default to `latest`. Digest pins keep the digest as tag.
    pub fn parse(image: &str) -> ImageRef {
        let (registry, rest) = match image.split_once('/') {
            Some((head, rest)) if head.contains('.') || head.contains(':') || head == "localhost" => {
                (head.to_string(), rest.to_string())
            }
            _ => (String::from("docker.io"), image.to_string()),
        };
        let (repository, tag) = match rest.split_once('@') {
            Some((repository, digest)) => (repository.to_string(), digest.to_string()),
            None => match rest.rsplit_once(':') {
                Some((repository, tag)) if !tag.contains('/') => {
                    (repository.to_string(), tag.to_string())
                }
                _ => (rest.clone(), String::from("latest")),
            },
        };
        ImageRef {
            registry,
            repository,
            tag,
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// A Gateway API gateway.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub namespace: String,
    pub name: String,
    pub class_name: String,
    pub addresses: Vec<String>,
}

/// A Gateway API HTTPRoute.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HttpRoute {
    pub namespace: String,
    pub name: String,
    pub hostnames: Vec<String>,
    pub parent_refs: Vec<RouteParentRef>,
}

/// Parent gateway (and optionally listener) an HTTPRoute attaches to.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouteParentRef {
    pub name: String,
    pub section_name: String,
}

/// A namespace of interest, tagged with the cluster it was observed in.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub cluster: String,
    pub name: String,
}

/// An Envoy Gateway SecurityPolicy, reduced to the attributes the security table reports.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub cluster: String,
    pub namespace: String,
    pub name: String,

    pub target_kind: String,
    pub target_name: String,

    /// The policy configures JWT authentication.
    pub has_jwt: bool,

    /// The policy configures an authorization ruleset.
    pub has_authorization: bool,
}

/// An Envoy Gateway ClientTrafficPolicy, reduced to its client mTLS contract.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClientTrafficPolicy {
    pub namespace: String,
    pub name: String,

    /// Gateway listener section the policy applies to.
    pub target_section: String,

    /// Client certificate validation is requested but optional.
    pub optional: bool,
}

/// A mesh resource describing an endpoint external to the local mesh.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub cluster: String,
    pub namespace: String,
    pub name: String,

    pub hosts: Vec<String>,

    /// Istio location attribute (`MESH_EXTERNAL` or `MESH_INTERNAL`).
    pub location: String,

    /// `topology.istio.io/network` label, identifying the remote network.
    pub network: String,
}

/// An in-mesh gateway exposing the well-known cross-cluster mTLS port (15443).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EastWestGateway {
    pub cluster: String,
    pub namespace: String,
    pub name: String,

    pub address: String,

    /// `topology.istio.io/network` label of the gateway service.
    pub network: String,
}

/// A Kubernetes service of type LoadBalancer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub namespace: String,
    pub name: String,
    pub address: String,
    pub ports: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::ImageRef;

    #[test]
    fn image_with_registry_and_tag() {
        let image = ImageRef::parse("ghcr.io/fluxcd/source-controller:v1.3.0");
        assert_eq!(image.registry, "ghcr.io");
        assert_eq!(image.repository, "fluxcd/source-controller");
        assert_eq!(image.tag, "v1.3.0");
    }

    #[test]
    fn image_without_registry() {
        let image = ImageRef::parse("nginx:1.25");
        assert_eq!(image.registry, "docker.io");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "1.25");
    }

    #[test]
    fn image_without_tag() {
        let image = ImageRef::parse("quay.io/prometheus/node-exporter");
        assert_eq!(image.registry, "quay.io");
        assert_eq!(image.repository, "prometheus/node-exporter");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn image_with_registry_port() {
        let image = ImageRef::parse("registry.lab:5000/apps/api:2.1");
        assert_eq!(image.registry, "registry.lab:5000");
        assert_eq!(image.repository, "apps/api");
        assert_eq!(image.tag, "2.1");
    }

    #[test]
    fn image_with_digest() {
        let image = ImageRef::parse("docker.io/library/redis@sha256:abcd");
        assert_eq!(image.repository, "library/redis");
        assert_eq!(image.tag, "sha256:abcd");
    }
}
