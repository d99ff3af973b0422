// Prometheus metrics definitions for the content server.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Entries in the most recent successful catalog scan.
    pub static ref CATALOG_ENTRIES: IntGauge =
        IntGauge::new("lanlauncher_catalog_entries", "Games in the last catalog scan").unwrap();

    /// File transfers currently streaming to clients.
    pub static ref ACTIVE_TRANSFERS: IntGauge =
        IntGauge::new("lanlauncher_active_transfers", "File transfers in progress").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Catalog scans, by outcome (ok, error).
    pub static ref CATALOG_SCANS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lanlauncher_catalog_scans_total", "Total catalog scans"),
        &["outcome"],
    )
    .unwrap();

    /// File transfer requests, by kind (download, cover) and outcome.
    pub static ref TRANSFERS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lanlauncher_transfers_total", "Total file transfer requests"),
        &["kind", "outcome"],
    )
    .unwrap();

    /// Total HTTP requests, by method/route/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lanlauncher_api_requests_total", "Total API requests"),
        &["method", "route", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Time to produce a response head, by route.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "lanlauncher_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["route"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CATALOG_ENTRIES.clone()),
        Box::new(ACTIVE_TRANSFERS.clone()),
        Box::new(CATALOG_SCANS_TOTAL.clone()),
        Box::new(TRANSFERS_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("Metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
