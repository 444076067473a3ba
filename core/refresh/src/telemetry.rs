//! Telemetry for the refresh pipeline.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::CounterVec;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::Opts;

/// Duration of completed refresh cycles.
pub static REFRESH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "clustermap_refresh_duration_seconds",
        "Duration of completed refresh cycles",
    ))
    .expect("failed to initialise REFRESH_DURATION histogram")
});

/// Number of refresh invocations by outcome.
pub static REFRESH_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "clustermap_refresh_count",
            "Number of refresh invocations by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to initialise REFRESH_COUNT counter")
});

/// Ensure metrics are registered only once.
static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// The first time this method is called it will register the refresh metrics.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 2] = [
        Box::new(REFRESH_DURATION.clone()),
        Box::new(REFRESH_COUNT.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}
