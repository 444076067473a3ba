//! In-memory [`ClusterApi`] backend for unit tests.
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value as Json;

use clustermap_context::Context;
use clustermap_context::ShutdownInterrupt;

use crate::api::ClusterApi;
use crate::api::KindNotInstalled;
use crate::api::ResourceKind;

/// Simulated failure of every call, standing in for an unreachable cluster.
#[derive(Debug, thiserror::Error)]
#[error("fixture cluster is unreachable")]
pub struct FixtureUnreachable;

/// In-memory [`ClusterApi`] backend for unit tests.
///
/// Kinds without seeded objects list as empty, like a cluster with the CRD
/// installed but no instances. Kinds marked missing return the
/// [`KindNotInstalled`] marker instead.
#[derive(Default)]
pub struct FixtureApi {
    /// Number of list calls served so far, across all kinds.
    pub calls: AtomicUsize,

    /// Artificial delay before responses, to widen race windows in tests.
    pub delay: Option<Duration>,

    missing: HashSet<String>,
    objects: Mutex<HashMap<String, Vec<Json>>>,
    unreachable: bool,
}

impl FixtureApi {
    pub fn new() -> FixtureApi {
        FixtureApi::default()
    }

    /// A fixture where every call fails, like a cluster that is down.
    pub fn unreachable() -> FixtureApi {
        FixtureApi {
            unreachable: true,
            ..FixtureApi::default()
        }
    }

    /// Mark a resource kind as not installed in the fixture cluster.
    pub fn kind_not_installed(mut self, kind: &ResourceKind) -> Self {
        self.missing.insert(kind.kind.to_string());
        self
    }

    /// Seed objects returned when the given kind is listed.
    pub fn with_objects(self, kind: &ResourceKind, objects: Vec<Json>) -> Self {
        self.objects
            .lock()
            .expect("FixtureApi objects lock poisoned")
            .insert(kind.kind.to_string(), objects);
        self
    }
}

#[async_trait::async_trait]
impl ClusterApi for FixtureApi {
    async fn list(&self, context: &Context, kind: &ResourceKind) -> Result<Vec<Json>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => return Err(ShutdownInterrupt.into()),
                _ = tokio::time::sleep(delay) => (),
            }
        }
        context.check_shutdown()?;
        if self.unreachable {
            anyhow::bail!(FixtureUnreachable);
        }
        if self.missing.contains(kind.kind) {
            let kind = kind.kind.to_string();
            anyhow::bail!(KindNotInstalled { kind });
        }
        let objects = self
            .objects
            .lock()
            .expect("FixtureApi objects lock poisoned")
            .get(kind.kind)
            .cloned()
            .unwrap_or_default();
        Ok(objects)
    }
}
