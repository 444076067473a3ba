//! Namespace security posture table and summary pie.
use std::collections::BTreeMap;

use serde::Serialize;

use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::Snapshot;

#[derive(Debug, Serialize)]
struct SecurityRow {
    cluster: String,
    namespace: String,

    /// `yes`, `optional` or `no`.
    client_mtls: &'static str,

    jwt: bool,
    authorization: bool,

    /// Number of security policies applied in the namespace.
    policies: usize,
}

/// Render the security table and its summary pie chart.
///
/// Always emits both artifacts so the front-end layout stays stable.
pub fn generate(snapshot: &Snapshot) -> Vec<DiagramArtifact> {
    if snapshot.namespaces.is_empty() {
        return vec![
            crate::placeholder("security", "Security", "No namespaces discovered yet."),
            crate::placeholder(
                "security-chart",
                "Client mTLS",
                "No namespaces discovered yet.",
            ),
        ];
    }

    let mut rows: Vec<SecurityRow> = snapshot
        .namespaces
        .iter()
        .map(|namespace| {
            let policies: Vec<_> = snapshot
                .security_policies
                .iter()
                .filter(|policy| {
                    policy.cluster == namespace.cluster && policy.namespace == namespace.name
                })
                .collect();
            SecurityRow {
                cluster: namespace.cluster.clone(),
                namespace: namespace.name.clone(),
                client_mtls: client_mtls(snapshot, &namespace.name),
                jwt: policies.iter().any(|policy| policy.has_jwt),
                authorization: policies.iter().any(|policy| policy.has_authorization),
                policies: policies.len(),
            }
        })
        .collect();
    rows.sort_by(|a, b| (&a.cluster, &a.namespace).cmp(&(&b.cluster, &b.namespace)));

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.client_mtls).or_default() += 1;
    }
    let mut pie = vec![String::from("pie title Client mTLS coverage")];
    for (label, count) in counts {
        pie.push(format!("    \"{}\" : {}", label, count));
    }

    let content = serde_json::to_string(&rows).expect("security rows must serialise");
    vec![
        DiagramArtifact::new("security", "Security", DiagramKind::Table, content),
        DiagramArtifact::new(
            "security-chart",
            "Client mTLS",
            DiagramKind::Mermaid,
            pie.join("\n"),
        ),
    ]
}

/// Client mTLS posture of a namespace.
///
/// HTTPRoutes are cross-referenced with client traffic policies by the
/// listener `sectionName` their parent refs attach to: any matching policy
/// with required validation makes the namespace a `yes`, only optional
/// matches an `optional`, no match a `no`.
fn client_mtls(snapshot: &Snapshot, namespace: &str) -> &'static str {
    let mut matched = false;
    let mut required = false;
    for route in &snapshot.routes {
        if route.namespace != namespace {
            continue;
        }
        for parent in &route.parent_refs {
            if parent.section_name.is_empty() {
                continue;
            }
            for policy in &snapshot.client_traffic_policies {
                if policy.target_section != parent.section_name {
                    continue;
                }
                matched = true;
                if !policy.optional {
                    required = true;
                }
            }
        }
    }
    match (matched, required) {
        (_, true) => "yes",
        (true, false) => "optional",
        (false, false) => "no",
    }
}

#[cfg(test)]
mod tests {
    use clustermap_models::ClientTrafficPolicy;
    use clustermap_models::DiagramKind;
    use clustermap_models::HttpRoute;
    use clustermap_models::NamespaceRecord;
    use clustermap_models::RouteParentRef;
    use clustermap_models::SecurityPolicy;
    use clustermap_models::Snapshot;

    use super::generate;

    fn namespace(cluster: &str, name: &str) -> NamespaceRecord {
        NamespaceRecord {
            cluster: cluster.into(),
            name: name.into(),
        }
    }

    fn route(namespace: &str, name: &str, section: &str) -> HttpRoute {
        HttpRoute {
            namespace: namespace.into(),
            name: name.into(),
            hostnames: vec![],
            parent_refs: vec![RouteParentRef {
                name: "gateway".into(),
                section_name: section.into(),
            }],
        }
    }

    fn policy(name: &str, section: &str, optional: bool) -> ClientTrafficPolicy {
        ClientTrafficPolicy {
            namespace: "gateways".into(),
            name: name.into(),
            target_section: section.into(),
            optional,
        }
    }

    #[test]
    fn mtls_posture_per_namespace() {
        let mut snapshot = Snapshot::default();
        snapshot.namespaces = vec![
            namespace("Homelab", "strict"),
            namespace("Homelab", "relaxed"),
            namespace("Homelab", "open"),
        ];
        snapshot.routes = vec![
            route("strict", "app", "mtls"),
            route("relaxed", "app", "maybe"),
            route("open", "app", "plain"),
        ];
        snapshot.client_traffic_policies = vec![
            policy("required", "mtls", false),
            policy("opt-in", "maybe", true),
        ];

        let artifacts = generate(&snapshot);
        assert_eq!(artifacts.len(), 2);
        let rows: serde_json::Value = serde_json::from_str(&artifacts[0].content).unwrap();
        let by_namespace = |name: &str| {
            rows.as_array()
                .unwrap()
                .iter()
                .find(|row| row["namespace"] == name)
                .unwrap()
                .clone()
        };
        assert_eq!(by_namespace("strict")["client_mtls"], "yes");
        assert_eq!(by_namespace("relaxed")["client_mtls"], "optional");
        assert_eq!(by_namespace("open")["client_mtls"], "no");
    }

    #[test]
    fn policy_columns_from_security_policies() {
        let mut snapshot = Snapshot::default();
        snapshot.namespaces = vec![namespace("Homelab", "media")];
        snapshot.security_policies = vec![
            SecurityPolicy {
                cluster: "Homelab".into(),
                namespace: "media".into(),
                name: "jwt".into(),
                has_jwt: true,
                ..SecurityPolicy::default()
            },
            SecurityPolicy {
                cluster: "Homelab".into(),
                namespace: "media".into(),
                name: "authz".into(),
                has_authorization: true,
                ..SecurityPolicy::default()
            },
        ];

        let artifacts = generate(&snapshot);
        let rows: serde_json::Value = serde_json::from_str(&artifacts[0].content).unwrap();
        assert_eq!(rows[0]["jwt"], true);
        assert_eq!(rows[0]["authorization"], true);
        assert_eq!(rows[0]["policies"], 2);
    }

    #[test]
    fn pie_counts_postures() {
        let mut snapshot = Snapshot::default();
        snapshot.namespaces = vec![
            namespace("Homelab", "a"),
            namespace("Homelab", "b"),
        ];
        let artifacts = generate(&snapshot);
        let pie = &artifacts[1];
        assert_eq!(pie.kind, DiagramKind::Mermaid);
        assert!(pie.content.starts_with("pie title Client mTLS coverage"));
        assert!(pie.content.contains("\"no\" : 2"));
    }

    #[test]
    fn always_two_artifacts() {
        let artifacts = generate(&Snapshot::default());
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].id, "security");
        assert_eq!(artifacts[1].id, "security-chart");
    }
}
