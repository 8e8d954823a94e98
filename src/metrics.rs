// Prometheus metrics definitions for the killfeed bot.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Killfeed monitors with a live poll task.
    pub static ref KILLFEED_ACTIVE_MONITORS: IntGauge =
        IntGauge::new("killfeed_active_monitors", "Killfeed monitors currently polling").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Poll cycles, by outcome (ok, upstream_error).
    pub static ref KILLFEED_POLLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("killfeed_polls_total", "Killfeed poll cycles"),
        &["outcome"],
    )
    .unwrap();

    /// Kill events handed to a sink successfully.
    pub static ref KILLFEED_EVENTS_DELIVERED_TOTAL: IntCounter = IntCounter::new(
        "killfeed_events_delivered_total",
        "Kill events delivered",
    )
    .unwrap();

    /// Kill events the sink rejected (not redelivered).
    pub static ref KILLFEED_DELIVERY_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "killfeed_delivery_failures_total",
        "Kill events that failed delivery",
    )
    .unwrap();

    /// Upstream stats API requests, by endpoint and status.
    pub static ref UPSTREAM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("killfeed_upstream_requests_total", "Stats API requests"),
        &["endpoint", "status"],
    )
    .unwrap();

    /// Ranking computations, by metric.
    pub static ref RANKING_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("killfeed_ranking_requests_total", "Ranking computations"),
        &["metric"],
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("killfeed_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Stats API latency in seconds, by endpoint.
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "killfeed_upstream_request_duration_seconds",
            "Stats API request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["endpoint"],
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "killfeed_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(KILLFEED_ACTIVE_MONITORS.clone()),
        Box::new(KILLFEED_POLLS_TOTAL.clone()),
        Box::new(KILLFEED_EVENTS_DELIVERED_TOTAL.clone()),
        Box::new(KILLFEED_DELIVERY_FAILURES_TOTAL.clone()),
        Box::new(UPSTREAM_REQUESTS_TOTAL.clone()),
        Box::new(RANKING_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a URL path for metric labels: collapse the player-name segment
/// of `/api/players/{name}/stats` and numeric segments to keep cardinality
/// bounded.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let is_player_name = i == 3
                && segments.get(1) == Some(&"api")
                && segments.get(2) == Some(&"players");
            if is_player_name || segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
