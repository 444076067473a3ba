//! Record types for clustermap snapshots and diagram artifacts.
//!
//! Everything one refresh cycle collects is modelled here as plain serde
//! structs. Records are collected by the sources, merged into a [`Snapshot`]
//! by the refresh orchestrator and consumed by the diagram generators.
//! A published snapshot is immutable: readers share it through an `Arc`.
mod cluster;
mod diagram;
mod infra;
mod snapshot;

pub use self::cluster::ClientTrafficPolicy;
pub use self::cluster::EastWestGateway;
pub use self::cluster::Gateway;
pub use self::cluster::HelmRelease;
pub use self::cluster::HelmRepository;
pub use self::cluster::HttpRoute;
pub use self::cluster::ImageRef;
pub use self::cluster::Kustomization;
pub use self::cluster::LoadBalancer;
pub use self::cluster::NamespaceRecord;
pub use self::cluster::Node;
pub use self::cluster::PodImage;
pub use self::cluster::RepositoryKind;
pub use self::cluster::RouteParentRef;
pub use self::cluster::SecurityPolicy;
pub use self::cluster::ServiceEntry;
pub use self::diagram::DiagramArtifact;
pub use self::diagram::DiagramKind;
pub use self::infra::ComposeFile;
pub use self::infra::DockerService;
pub use self::infra::InfraPayload;
pub use self::infra::InfraSource;
pub use self::infra::NodeRole;
pub use self::infra::TerraformNode;
pub use self::infra::TerraformState;
pub use self::snapshot::Published;
pub use self::snapshot::Snapshot;
