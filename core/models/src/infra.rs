//! Records parsed from side-channel infrastructure files.
use serde::Deserialize;
use serde::Serialize;

/// A named infrastructure source read from a mounted file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InfraSource {
    /// The configured name of the data source.
    pub name: String,

    /// The parsed content of the source file.
    pub payload: InfraPayload,
}

/// Parsed content of an infrastructure source file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfraPayload {
    Tfstate(TerraformState),
    DockerCompose(ComposeFile),
}

/// Virtual machines described by a Terraform state file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TerraformState {
    pub nodes: Vec<TerraformNode>,
}

/// A virtual machine managed through Terraform.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TerraformNode {
    pub name: String,
    pub role: NodeRole,
    pub cpus: i64,

    /// Memory assigned to the VM, in MiB.
    pub memory_mb: i64,
}

/// The role a VM plays in the cluster it backs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Controlplane,
    #[default]
    Worker,
}

impl NodeRole {
    /// Infer the role of a VM from its resource and VM names.
    ///
    /// The match is a substring search over the lowercased concatenation of both names.
    pub fn infer(resource_name: &str, vm_name: &str) -> NodeRole {
        let haystack = format!("{} {}", resource_name, vm_name).to_lowercase();
        let markers = ["controlplane", "control-plane", "master", "-cp-"];
        if markers.iter().any(|marker| haystack.contains(marker)) {
            return NodeRole::Controlplane;
        }
        NodeRole::Worker
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Controlplane => write!(f, "controlplane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

/// Services described by a Docker Compose manifest.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    pub services: Vec<DockerService>,
}

/// A single service in a Docker Compose manifest.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DockerService {
    pub name: String,
    pub image: String,
    pub ports: Vec<String>,
    pub depends_on: Vec<String>,
}
