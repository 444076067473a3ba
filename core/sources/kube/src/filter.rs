//! Namespace filtering for snapshot collection.

/// Namespaces excluded from snapshots by exact name.
const RESERVED_NAMES: &[&str] = &[
    "default",
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "flux-system",
    "local-path-storage",
];

/// Namespaces excluded from snapshots by name prefix.
const RESERVED_PREFIXES: &[&str] = &[
    "kube-",
    "flux-",
    "cert-manager",
    "envoy-gateway",
    "istio-",
    "cnpg-",
    "rook-",
    "ot-operators",
];

/// Whether a namespace belongs to cluster plumbing rather than workloads.
pub fn is_reserved(name: &str) -> bool {
    if RESERVED_NAMES.contains(&name) {
        return true;
    }
    RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
