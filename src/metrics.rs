use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("trades_ingested_total").absolute(0);
    counter!("resolutions_ingested_total").absolute(0);
    counter!("detection_runs_total").absolute(0);
    counter!("detection_trades_processed_total").absolute(0);
    counter!("detection_trades_skipped_total").absolute(0);
    counter!("detection_trades_errored_total").absolute(0);
    counter!("badges_awarded_total").absolute(0);

    gauge!("tracked_wallets").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("detection_run_seconds").record(0.0);

    handle
}
