//! The refresh orchestrator: ingest, enrich, render, publish.
//!
//! One [`Refresher`] drives the whole pipeline. Per refresh it collects the
//! full record set from the primary cluster, the reduced subset from each
//! secondary cluster and the configured infrastructure files, hands the
//! results to the freshness checkers (non-blocking, they gate themselves),
//! renders every diagram in a fixed order and atomically publishes the result
//! to the snapshot store.
//!
//! Refreshes are single-flight: a `refresh()` arriving while one is running
//! is dropped, not queued. Per-source failures degrade the snapshot; only a
//! total failure of the primary cluster suppresses publication so the read
//! API keeps signalling "initializing" until real data exists.
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;

use clustermap_context::Context;
use clustermap_diagrams::FreshnessCaches;
use clustermap_fresh::ChartsCache;
use clustermap_fresh::ImagesCache;
use clustermap_fresh::NodesCache;
use clustermap_models::Published;
use clustermap_source_file::FileKind;
use clustermap_source_kube::ClusterSource;
use clustermap_store::SnapshotStore;

mod collect;
mod telemetry;

pub use self::telemetry::register_metrics;

/// One configured infrastructure file to read every refresh.
#[derive(Clone, Debug)]
pub struct FileSpec {
    pub name: String,
    pub kind: FileKind,
    pub path: String,
}

/// Everything a [`Refresher`] needs to drive the pipeline.
pub struct RefresherSetup {
    pub charts: ChartsCache,
    pub files: Vec<FileSpec>,
    pub images: ImagesCache,
    pub interval: Duration,
    pub nodes: NodesCache,
    pub primary: ClusterSource,
    pub secondaries: Vec<ClusterSource>,
    pub store: SnapshotStore,
}

/// How a `refresh()` invocation ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshOutcome {
    /// The pipeline ran and a new snapshot was published.
    Completed,

    /// Another refresh was in flight, this invocation was dropped.
    AlreadyRunning,

    /// Every primary cluster read failed, nothing was published.
    PrimaryUnavailable,
}

impl RefreshOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Completed => "completed",
            RefreshOutcome::AlreadyRunning => "already-running",
            RefreshOutcome::PrimaryUnavailable => "primary-unavailable",
        }
    }
}

/// Single-flight orchestrator of the ingest, enrich, render pipeline.
#[derive(Clone)]
pub struct Refresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    charts: ChartsCache,
    files: Vec<FileSpec>,
    flight: tokio::sync::Mutex<()>,
    images: ImagesCache,
    interval: Duration,
    nodes: NodesCache,
    primary: ClusterSource,
    secondaries: Vec<ClusterSource>,
    store: SnapshotStore,
}

impl Refresher {
    pub fn new(setup: RefresherSetup) -> Refresher {
        Refresher {
            inner: Arc::new(RefresherInner {
                charts: setup.charts,
                files: setup.files,
                flight: tokio::sync::Mutex::new(()),
                images: setup.images,
                interval: setup.interval,
                nodes: setup.nodes,
                primary: setup.primary,
                secondaries: setup.secondaries,
                store: setup.store,
            }),
        }
    }

    /// Run one refresh cycle, unless one is already in flight.
    ///
    /// Errors are only returned for process shutdown; everything else
    /// degrades and is reported through logs and the outcome.
    pub async fn refresh(&self, context: &Context) -> Result<RefreshOutcome> {
        let _flight = match self.inner.flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                slog::debug!(context.logger, "Snapshot refresh already in flight, dropping");
                return Ok(RefreshOutcome::AlreadyRunning);
            }
        };

        let started = Instant::now();
        let result = self.refresh_locked(context).await;
        let duration = started.elapsed();
        match &result {
            Ok(outcome) => {
                telemetry::REFRESH_DURATION.observe(duration.as_secs_f64());
                telemetry::REFRESH_COUNT
                    .with_label_values(&[outcome.as_str()])
                    .inc();
                slog::info!(
                    context.logger, "Snapshot refresh finished";
                    "duration_ms" => duration.as_millis() as u64,
                    "outcome" => outcome.as_str(),
                );
            }
            Err(_) => {
                slog::info!(
                    context.logger, "Snapshot refresh aborted by shutdown";
                    "duration_ms" => duration.as_millis() as u64,
                );
            }
        }
        result
    }

    /// The refresh pipeline body, running under the single-flight guard.
    async fn refresh_locked(&self, context: &Context) -> Result<RefreshOutcome> {
        // Step 1: full collection from the primary cluster.
        let collection = collect::primary(context, &self.inner.primary).await?;
        if collection.attempted > 0 && collection.failed == collection.attempted {
            slog::warn!(
                context.logger, "Primary cluster unavailable, keeping previous snapshot";
                "cluster" => self.inner.primary.cluster(),
            );
            return Ok(RefreshOutcome::PrimaryUnavailable);
        }
        let mut snapshot = collection.snapshot;

        // Step 2: the reduced subset from every secondary cluster, appended
        // in deterministic order so equivalent inputs render identically.
        collect::secondaries(context, &self.inner.secondaries, &mut snapshot).await?;

        // Step 3: infrastructure files. Failures are logged and skipped.
        collect::files(context, &self.inner.files, &mut snapshot).await?;

        // Step 4: hand the snapshot to the freshness checkers. The checkers
        // single-flight and time gate themselves; the refresh never waits.
        let (chart_refs, image_refs, node_versions) = collect::freshness_inputs(&snapshot);
        {
            let cache = self.inner.charts.clone();
            let context = context.clone();
            tokio::spawn(async move { cache.check(&context, chart_refs).await });
        }
        {
            let cache = self.inner.images.clone();
            let context = context.clone();
            tokio::spawn(async move { cache.check(&context, image_refs).await });
        }
        {
            let cache = self.inner.nodes.clone();
            let context = context.clone();
            tokio::spawn(async move { cache.check(&context, node_versions).await });
        }

        // Step 5: render all diagrams in their fixed order.
        let caches = FreshnessCaches {
            charts: &self.inner.charts,
            images: &self.inner.images,
            nodes: &self.inner.nodes,
        };
        let diagrams = clustermap_diagrams::render_all(&snapshot, &caches);

        // Step 6: atomic publication.
        context.check_shutdown()?;
        self.inner.store.publish(Published {
            snapshot,
            diagrams,
            generated_at: OffsetDateTime::now_utc(),
        });
        Ok(RefreshOutcome::Completed)
    }

    /// Refresh at startup, then on every tick until shutdown.
    pub async fn run(&self, context: &Context) {
        if let Err(error) = self.refresh(context).await {
            slog::warn!(
                context.logger, "Startup snapshot refresh did not complete";
                "error" => %error,
            );
        }

        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately and the
        // startup refresh already covered it.
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(error) = self.refresh(context).await {
                        slog::warn!(
                            context.logger, "Scheduled snapshot refresh did not complete";
                            "error" => %error,
                        );
                    }
                }
            }
        }
        slog::info!(context.logger, "Refresh loop stopped");
    }
}

#[cfg(test)]
mod tests;
