//! The narrow cluster API boundary the sources are built on.
//!
//! List responses arrive as loosely-typed JSON trees; typed extraction happens
//! in [`ClusterSource`](crate::ClusterSource) so backends stay trivial.
use anyhow::Result;
use serde_json::Value as Json;

use clustermap_context::Context;

/// A resource kind the service lists from clusters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

pub const NODES: ResourceKind = ResourceKind {
    group: "",
    version: "v1",
    kind: "Node",
    plural: "nodes",
};

pub const NAMESPACES: ResourceKind = ResourceKind {
    group: "",
    version: "v1",
    kind: "Namespace",
    plural: "namespaces",
};

pub const PODS: ResourceKind = ResourceKind {
    group: "",
    version: "v1",
    kind: "Pod",
    plural: "pods",
};

pub const SERVICES: ResourceKind = ResourceKind {
    group: "",
    version: "v1",
    kind: "Service",
    plural: "services",
};

pub const KUSTOMIZATIONS: ResourceKind = ResourceKind {
    group: "kustomize.toolkit.fluxcd.io",
    version: "v1",
    kind: "Kustomization",
    plural: "kustomizations",
};

pub const HELM_RELEASES: ResourceKind = ResourceKind {
    group: "helm.toolkit.fluxcd.io",
    version: "v2",
    kind: "HelmRelease",
    plural: "helmreleases",
};

pub const HELM_REPOSITORIES: ResourceKind = ResourceKind {
    group: "source.toolkit.fluxcd.io",
    version: "v1",
    kind: "HelmRepository",
    plural: "helmrepositories",
};

pub const GATEWAYS: ResourceKind = ResourceKind {
    group: "gateway.networking.k8s.io",
    version: "v1",
    kind: "Gateway",
    plural: "gateways",
};

pub const HTTP_ROUTES: ResourceKind = ResourceKind {
    group: "gateway.networking.k8s.io",
    version: "v1",
    kind: "HTTPRoute",
    plural: "httproutes",
};

pub const SECURITY_POLICIES: ResourceKind = ResourceKind {
    group: "gateway.envoyproxy.io",
    version: "v1alpha1",
    kind: "SecurityPolicy",
    plural: "securitypolicies",
};

pub const CLIENT_TRAFFIC_POLICIES: ResourceKind = ResourceKind {
    group: "gateway.envoyproxy.io",
    version: "v1alpha1",
    kind: "ClientTrafficPolicy",
    plural: "clienttrafficpolicies",
};

pub const SERVICE_ENTRIES: ResourceKind = ResourceKind {
    group: "networking.istio.io",
    version: "v1beta1",
    kind: "ServiceEntry",
    plural: "serviceentries",
};

/// The requested resource kind is not installed in the cluster.
///
/// Sources treat this as "no records" since optional CRDs (service mesh,
/// gateway implementations) are legitimately absent from smaller clusters.
#[derive(Debug, thiserror::Error)]
#[error("resource kind '{kind}' is not installed in the cluster")]
pub struct KindNotInstalled {
    pub kind: String,
}

/// Check an error chain for the [`KindNotInstalled`] marker.
pub fn is_kind_not_installed(error: &anyhow::Error) -> bool {
    error.is::<KindNotInstalled>() || error.chain().any(|cause| cause.is::<KindNotInstalled>())
}

/// Read access to one cluster.
///
/// Implementations return whole list responses as loosely-typed JSON objects.
/// A missing resource kind is reported with the [`KindNotInstalled`] marker;
/// transient connection errors propagate unchanged so callers can record a
/// per-source failure.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    /// List all objects of a resource kind across the cluster.
    async fn list(&self, context: &Context, kind: &ResourceKind) -> Result<Vec<Json>>;
}
