//! Holder of the most recently published snapshot.
//!
//! The store is the only hand-off point between the refresh orchestrator
//! (single writer) and the HTTP read handlers (many readers). Publication is
//! an `Arc` swap under a short critical section: readers never observe a
//! partially merged result and never block the writer for longer than the
//! pointer exchange.
use std::sync::Arc;
use std::sync::RwLock;

use clustermap_models::Published;

/// Process wide holder of the most recently published refresh result.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Option<Arc<Published>>>>,
}

impl SnapshotStore {
    /// Initialise an empty store: readers see no snapshot until the first publish.
    pub fn new() -> SnapshotStore {
        SnapshotStore::default()
    }

    /// The most recently published result, if any refresh completed yet.
    pub fn latest(&self) -> Option<Arc<Published>> {
        self.inner
            .read()
            .expect("SnapshotStore RwLock poisoned")
            .clone()
    }

    /// Atomically replace the published result.
    ///
    /// The previous snapshot is released once its last reader drops it.
    pub fn publish(&self, published: Published) {
        let published = Arc::new(published);
        let mut slot = self.inner.write().expect("SnapshotStore RwLock poisoned");
        *slot = Some(published);
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use clustermap_models::DiagramArtifact;
    use clustermap_models::DiagramKind;
    use clustermap_models::Published;
    use clustermap_models::Snapshot;

    use super::SnapshotStore;

    fn published(marker: &str) -> Published {
        let snapshot = Snapshot {
            cluster: marker.into(),
            ..Snapshot::default()
        };
        let diagrams = vec![DiagramArtifact::new(
            "marker",
            marker,
            DiagramKind::Markdown,
            marker,
        )];
        Published {
            snapshot,
            diagrams,
            generated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn empty_until_first_publish() {
        let store = SnapshotStore::new();
        assert!(store.latest().is_none());
    }

    #[test]
    fn publish_replaces() {
        let store = SnapshotStore::new();
        store.publish(published("one"));
        store.publish(published("two"));
        let latest = store.latest().unwrap();
        assert_eq!(latest.snapshot.cluster, "two");
    }

    // Readers sampling around publishes must only ever see fully formed
    // results: the cluster marker and the diagram markers always agree.
    #[test]
    fn readers_never_observe_a_mixed_snapshot() {
        let store = SnapshotStore::new();
        store.publish(published("a"));

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    let latest = store.latest().unwrap();
                    let marker = &latest.snapshot.cluster;
                    assert_eq!(&latest.diagrams[0].title, marker);
                    assert_eq!(&latest.diagrams[0].content, marker);
                }
            })
        };
        let writer = std::thread::spawn(move || {
            for round in 0..10_000 {
                let marker = if round % 2 == 0 { "a" } else { "b" };
                store.publish(published(marker));
            }
        });

        reader.join().unwrap();
        writer.join().unwrap();
    }
}
