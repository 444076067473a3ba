//! Narrow read interface over one Kubernetes cluster.
//!
//! A [`ClusterSource`] wraps a [`ClusterApi`] backend and exposes one typed
//! list method per resource of interest. Each method swallows "resource kind
//! not installed" as an empty list with a log entry and propagates transient
//! connection errors so the refresh orchestrator can record per-source
//! failures.
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value as Json;

use clustermap_context::Context;
use clustermap_models::ClientTrafficPolicy;
use clustermap_models::EastWestGateway;
use clustermap_models::Gateway;
use clustermap_models::HelmRelease;
use clustermap_models::HelmRepository;
use clustermap_models::HttpRoute;
use clustermap_models::ImageRef;
use clustermap_models::Kustomization;
use clustermap_models::LoadBalancer;
use clustermap_models::NamespaceRecord;
use clustermap_models::Node;
use clustermap_models::PodImage;
use clustermap_models::RepositoryKind;
use clustermap_models::RouteParentRef;
use clustermap_models::SecurityPolicy;
use clustermap_models::ServiceEntry;

pub mod api;
mod client;
mod extract;
mod filter;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::FixtureApi;

pub use self::client::KubeApi;
pub use self::filter::is_reserved;

use self::api::ClusterApi;
use self::api::ResourceKind;

/// Well-known port east-west gateways expose for cross-cluster mTLS traffic.
const EAST_WEST_PORT: i64 = 15443;

/// The label carrying the mesh network an object belongs to.
const NETWORK_LABEL: &str = "topology.istio.io/network";

/// The reduced record subset collected from secondary clusters.
#[derive(Debug, Default)]
pub struct SecondaryData {
    pub namespaces: Vec<NamespaceRecord>,
    pub security_policies: Vec<SecurityPolicy>,
    pub kustomizations: Vec<Kustomization>,
}

/// Typed read methods over one cluster.
#[derive(Clone)]
pub struct ClusterSource {
    api: Arc<dyn ClusterApi>,
    cluster: String,
}

impl ClusterSource {
    /// Wrap a cluster API backend, tagging every record with the cluster name.
    pub fn new<S>(cluster: S, api: Arc<dyn ClusterApi>) -> ClusterSource
    where
        S: Into<String>,
    {
        ClusterSource {
            api,
            cluster: cluster.into(),
        }
    }

    /// Name records from this cluster are tagged with.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// List a kind, mapping "not installed" to an empty result.
    async fn list_kind(&self, context: &Context, kind: &ResourceKind) -> Result<Vec<Json>> {
        match self.api.list(context, kind).await {
            Ok(objects) => Ok(objects),
            Err(error) if api::is_kind_not_installed(&error) => {
                slog::debug!(
                    context.logger, "Resource kind not installed, no records collected";
                    "cluster" => &self.cluster,
                    "kind" => kind.kind,
                );
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    pub async fn list_nodes(&self, context: &Context) -> Result<Vec<Node>> {
        let objects = self.list_kind(context, &api::NODES).await?;
        let mut nodes: Vec<Node> = objects.iter().map(node_record).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    pub async fn list_namespaces(&self, context: &Context) -> Result<Vec<NamespaceRecord>> {
        let objects = self.list_kind(context, &api::NAMESPACES).await?;
        let mut namespaces: Vec<NamespaceRecord> = objects
            .iter()
            .map(|object| extract::string(object, &["metadata", "name"]))
            .filter(|name| !name.is_empty() && !filter::is_reserved(name))
            .map(|name| NamespaceRecord {
                cluster: self.cluster.clone(),
                name,
            })
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    /// List images of running pods, keyed by `(namespace, pod, container, init)`.
    ///
    /// Pods in a terminal phase (`Succeeded`, `Failed`) are excluded.
    pub async fn list_pod_images(&self, context: &Context) -> Result<Vec<PodImage>> {
        let objects = self.list_kind(context, &api::PODS).await?;
        let mut images = Vec::new();
        for object in &objects {
            let phase = extract::string(object, &["status", "phase"]);
            if phase == "Succeeded" || phase == "Failed" {
                continue;
            }
            let namespace = extract::string(object, &["metadata", "namespace"]);
            let pod = extract::string(object, &["metadata", "name"]);
            let statuses = [
                (false, extract::items(object, &["status", "containerStatuses"])),
                (true, extract::items(object, &["status", "initContainerStatuses"])),
            ];
            for (init, containers) in statuses {
                for container in containers {
                    let image = extract::string(container, &["image"]);
                    if image.is_empty() {
                        continue;
                    }
                    images.push(PodImage {
                        namespace: namespace.clone(),
                        pod: pod.clone(),
                        container: extract::string(container, &["name"]),
                        init,
                        image: ImageRef::parse(&image),
                        image_id: extract::string(container, &["imageID"]),
                    });
                }
            }
        }
        images.sort_by(|a, b| {
            (&a.namespace, &a.pod, &a.container, a.init)
                .cmp(&(&b.namespace, &b.pod, &b.container, b.init))
        });
        Ok(images)
    }

    /// List workload deployments, enforcing `(cluster, name)` uniqueness.
    pub async fn list_kustomizations(&self, context: &Context) -> Result<Vec<Kustomization>> {
        let objects = self.list_kind(context, &api::KUSTOMIZATIONS).await?;
        let mut kustomizations: Vec<Kustomization> = objects
            .iter()
            .map(|object| Kustomization {
                cluster: self.cluster.clone(),
                name: extract::string(object, &["metadata", "name"]),
                namespace: extract::string(object, &["metadata", "namespace"]),
                path: extract::string(object, &["spec", "path"]),
                depends_on: extract::items(object, &["spec", "dependsOn"])
                    .map(|entry| extract::string(entry, &["name"]))
                    .filter(|name| !name.is_empty())
                    .collect(),
            })
            .filter(|kustomization| !kustomization.name.is_empty())
            .collect();
        kustomizations.sort_by(|a, b| (&a.name, &a.namespace).cmp(&(&b.name, &b.namespace)));
        kustomizations.dedup_by(|next, kept| next.name == kept.name);
        Ok(kustomizations)
    }

    pub async fn list_helm_releases(&self, context: &Context) -> Result<Vec<HelmRelease>> {
        let objects = self.list_kind(context, &api::HELM_RELEASES).await?;
        let mut releases: Vec<HelmRelease> = objects.iter().map(|object| self.helm_release(object)).collect();
        releases.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(releases)
    }

    fn helm_release(&self, object: &Json) -> HelmRelease {
        // The deployed versions live in the release history; fall back to the
        // spec when the controller has not recorded a deployment yet.
        let history = extract::items(object, &["status", "history"]).next();
        let mut version = history
            .map(|entry| extract::string(entry, &["chartVersion"]))
            .unwrap_or_default();
        if version.is_empty() {
            version = extract::string(object, &["status", "lastAppliedRevision"]);
        }
        if version.is_empty() {
            version = extract::string(object, &["spec", "chart", "spec", "version"]);
        }
        let app_version = history
            .map(|entry| extract::string(entry, &["appVersion"]))
            .unwrap_or_default();
        let namespace = extract::string(object, &["metadata", "namespace"]);
        let mut source_namespace =
            extract::string(object, &["spec", "chart", "spec", "sourceRef", "namespace"]);
        if source_namespace.is_empty() {
            source_namespace = namespace.clone();
        }
        HelmRelease {
            cluster: self.cluster.clone(),
            namespace,
            name: extract::string(object, &["metadata", "name"]),
            chart: extract::string(object, &["spec", "chart", "spec", "chart"]),
            version,
            app_version,
            source_name: extract::string(object, &["spec", "chart", "spec", "sourceRef", "name"]),
            source_namespace,
        }
    }

    pub async fn list_helm_repositories(&self, context: &Context) -> Result<Vec<HelmRepository>> {
        let objects = self.list_kind(context, &api::HELM_REPOSITORIES).await?;
        let mut repositories: Vec<HelmRepository> = objects
            .iter()
            .map(|object| {
                let url = extract::string(object, &["spec", "url"]);
                let kind = if extract::string(object, &["spec", "type"]) == "oci"
                    || url.starts_with("oci://")
                {
                    RepositoryKind::Oci
                } else {
                    RepositoryKind::Default
                };
                HelmRepository {
                    cluster: self.cluster.clone(),
                    namespace: extract::string(object, &["metadata", "namespace"]),
                    name: extract::string(object, &["metadata", "name"]),
                    url,
                    kind,
                }
            })
            .collect();
        repositories.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(repositories)
    }

    pub async fn list_gateways(&self, context: &Context) -> Result<Vec<Gateway>> {
        let objects = self.list_kind(context, &api::GATEWAYS).await?;
        let mut gateways: Vec<Gateway> = objects
            .iter()
            .map(|object| Gateway {
                namespace: extract::string(object, &["metadata", "namespace"]),
                name: extract::string(object, &["metadata", "name"]),
                class_name: extract::string(object, &["spec", "gatewayClassName"]),
                addresses: extract::items(object, &["status", "addresses"])
                    .map(|address| extract::string(address, &["value"]))
                    .filter(|value| !value.is_empty())
                    .collect(),
            })
            .collect();
        gateways.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(gateways)
    }

    pub async fn list_routes(&self, context: &Context) -> Result<Vec<HttpRoute>> {
        let objects = self.list_kind(context, &api::HTTP_ROUTES).await?;
        let mut routes: Vec<HttpRoute> = objects
            .iter()
            .map(|object| HttpRoute {
                namespace: extract::string(object, &["metadata", "namespace"]),
                name: extract::string(object, &["metadata", "name"]),
                hostnames: extract::strings(object, &["spec", "hostnames"]),
                parent_refs: extract::items(object, &["spec", "parentRefs"])
                    .map(|parent| RouteParentRef {
                        name: extract::string(parent, &["name"]),
                        section_name: extract::string(parent, &["sectionName"]),
                    })
                    .collect(),
            })
            .collect();
        routes.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(routes)
    }

    pub async fn list_security_policies(&self, context: &Context) -> Result<Vec<SecurityPolicy>> {
        let objects = self.list_kind(context, &api::SECURITY_POLICIES).await?;
        let mut policies: Vec<SecurityPolicy> = objects
            .iter()
            .map(|object| {
                // Both the single targetRef form and the targetRefs list are in use.
                let target = extract::items(object, &["spec", "targetRefs"])
                    .next()
                    .or_else(|| extract::get(object, &["spec", "targetRef"]));
                SecurityPolicy {
                    cluster: self.cluster.clone(),
                    namespace: extract::string(object, &["metadata", "namespace"]),
                    name: extract::string(object, &["metadata", "name"]),
                    target_kind: target
                        .map(|target| extract::string(target, &["kind"]))
                        .unwrap_or_default(),
                    target_name: target
                        .map(|target| extract::string(target, &["name"]))
                        .unwrap_or_default(),
                    has_jwt: extract::present(object, &["spec", "jwt"]),
                    has_authorization: extract::present(object, &["spec", "authorization"]),
                }
            })
            .collect();
        policies.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(policies)
    }

    pub async fn list_client_traffic_policies(
        &self,
        context: &Context,
    ) -> Result<Vec<ClientTrafficPolicy>> {
        let objects = self.list_kind(context, &api::CLIENT_TRAFFIC_POLICIES).await?;
        let mut policies = Vec::new();
        for object in &objects {
            let namespace = extract::string(object, &["metadata", "namespace"]);
            let name = extract::string(object, &["metadata", "name"]);
            let optional = extract::boolean(object, &["spec", "tls", "clientValidation", "optional"]);
            // One record per targeted listener section keeps route matching simple.
            let sections: Vec<String> = extract::items(object, &["spec", "targetRefs"])
                .map(|target| extract::string(target, &["sectionName"]))
                .collect();
            if sections.iter().all(String::is_empty) {
                policies.push(ClientTrafficPolicy {
                    namespace,
                    name,
                    target_section: String::new(),
                    optional,
                });
                continue;
            }
            for section in sections.into_iter().filter(|section| !section.is_empty()) {
                policies.push(ClientTrafficPolicy {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    target_section: section,
                    optional,
                });
            }
        }
        policies.sort_by(|a, b| {
            (&a.namespace, &a.name, &a.target_section).cmp(&(&b.namespace, &b.name, &b.target_section))
        });
        Ok(policies)
    }

    pub async fn list_service_entries(&self, context: &Context) -> Result<Vec<ServiceEntry>> {
        let objects = self.list_kind(context, &api::SERVICE_ENTRIES).await?;
        let mut entries: Vec<ServiceEntry> = objects
            .iter()
            .map(|object| ServiceEntry {
                cluster: self.cluster.clone(),
                namespace: extract::string(object, &["metadata", "namespace"]),
                name: extract::string(object, &["metadata", "name"]),
                hosts: extract::strings(object, &["spec", "hosts"]),
                location: extract::string(object, &["spec", "location"]),
                network: extract::label(object, NETWORK_LABEL),
            })
            .collect();
        entries.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(entries)
    }

    /// List gateways exposing the well-known cross-cluster mTLS port.
    pub async fn list_east_west_gateways(&self, context: &Context) -> Result<Vec<EastWestGateway>> {
        let objects = self.list_kind(context, &api::SERVICES).await?;
        let mut gateways = Vec::new();
        for object in &objects {
            if extract::string(object, &["spec", "type"]) != "LoadBalancer" {
                continue;
            }
            let east_west = extract::items(object, &["spec", "ports"])
                .any(|port| extract::integer(port, &["port"]) == EAST_WEST_PORT);
            if !east_west {
                continue;
            }
            gateways.push(EastWestGateway {
                cluster: self.cluster.clone(),
                namespace: extract::string(object, &["metadata", "namespace"]),
                name: extract::string(object, &["metadata", "name"]),
                address: service_address(object),
                network: extract::label(object, NETWORK_LABEL),
            });
        }
        gateways.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(gateways)
    }

    pub async fn list_load_balancers(&self, context: &Context) -> Result<Vec<LoadBalancer>> {
        let objects = self.list_kind(context, &api::SERVICES).await?;
        let mut services = Vec::new();
        for object in &objects {
            if extract::string(object, &["spec", "type"]) != "LoadBalancer" {
                continue;
            }
            services.push(LoadBalancer {
                namespace: extract::string(object, &["metadata", "namespace"]),
                name: extract::string(object, &["metadata", "name"]),
                address: service_address(object),
                ports: extract::items(object, &["spec", "ports"])
                    .map(|port| extract::integer(port, &["port"]))
                    .filter(|port| *port != 0)
                    .collect(),
            });
        }
        services.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(services)
    }

    /// Collect the reduced record subset secondary clusters contribute.
    pub async fn security_data(&self, context: &Context) -> Result<SecondaryData> {
        let namespaces = self.list_namespaces(context).await?;
        let security_policies = self.list_security_policies(context).await?;
        let kustomizations = self.list_kustomizations(context).await?;
        Ok(SecondaryData {
            namespaces,
            security_policies,
            kustomizations,
        })
    }
}

/// Published address of a LoadBalancer service, preferring the IP.
fn service_address(object: &Json) -> String {
    let ingress = extract::items(object, &["status", "loadBalancer", "ingress"]).next();
    let address = ingress
        .map(|entry| extract::string(entry, &["ip"]))
        .unwrap_or_default();
    if !address.is_empty() {
        return address;
    }
    ingress
        .map(|entry| extract::string(entry, &["hostname"]))
        .unwrap_or_default()
}

/// Build a node record from a core v1 Node object.
fn node_record(object: &Json) -> Node {
    let mut roles: Vec<String> = extract::labels(object)
        .map(|labels| {
            labels
                .keys()
                .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    roles.sort();
    let internal_ip = extract::items(object, &["status", "addresses"])
        .find(|address| extract::string(address, &["type"]) == "InternalIP")
        .map(|address| extract::string(address, &["address"]))
        .unwrap_or_default();
    Node {
        name: extract::string(object, &["metadata", "name"]),
        roles,
        architecture: extract::string(object, &["status", "nodeInfo", "architecture"]),
        os_image: extract::string(object, &["status", "nodeInfo", "osImage"]),
        kernel_version: extract::string(object, &["status", "nodeInfo", "kernelVersion"]),
        kubelet_version: extract::string(object, &["status", "nodeInfo", "kubeletVersion"]),
        internal_ip,
        cpu: extract::string(object, &["status", "capacity", "cpu"]),
        memory: extract::string(object, &["status", "capacity", "memory"]),
    }
}
