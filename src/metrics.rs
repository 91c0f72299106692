//! Prometheus metrics for Stockroom

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Label used for requests that matched no route, to keep cardinality bounded
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Process-wide metrics, owned by the application state
pub struct Metrics {
    pub registry: Registry,

    // HTTP
    pub http_requests: IntCounterVec,
    pub http_latency: HistogramVec,
    pub http_in_progress: IntGaugeVec,

    // Cache
    pub cache_hits: IntCounterVec,
    pub cache_misses: IntCounterVec,

    // Items
    pub items_created: IntCounter,
    pub items_deleted: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "route", "status_class"],
        )?;
        let http_latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["route"],
        )?;
        let http_in_progress = IntGaugeVec::new(
            Opts::new(
                "http_requests_in_progress",
                "Number of HTTP requests currently being processed",
            ),
            &["method", "route"],
        )?;

        let cache_hits = IntCounterVec::new(
            Opts::new("cache_hits_total", "Total cache hits"),
            &["operation"],
        )?;
        let cache_misses = IntCounterVec::new(
            Opts::new("cache_misses_total", "Total cache misses"),
            &["operation"],
        )?;

        let items_created = IntCounter::new("items_created_total", "Total items created")?;
        let items_deleted = IntCounter::new("items_deleted_total", "Total items deleted")?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_latency.clone()))?;
        registry.register(Box::new(http_in_progress.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(items_created.clone()))?;
        registry.register(Box::new(items_deleted.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_latency,
            http_in_progress,
            cache_hits,
            cache_misses,
            items_created,
            items_deleted,
        })
    }

    /// Record one finished request
    pub fn observe_request(&self, method: &str, route: &str, status: u16, elapsed_secs: f64) {
        self.http_requests
            .with_label_values(&[method, route, status_class(status)])
            .inc();
        self.http_latency
            .with_label_values(&[route])
            .observe(elapsed_secs);
    }

    /// Track a request as in flight until the returned guard is dropped
    pub fn track_in_progress(&self, method: &str, route: &str) -> InProgressGuard {
        let gauge = self.http_in_progress.with_label_values(&[method, route]);
        gauge.inc();
        InProgressGuard { gauge }
    }

    pub fn record_cache_hit(&self, operation: &str) {
        self.cache_hits.with_label_values(&[operation]).inc();
    }

    pub fn record_cache_miss(&self, operation: &str) {
        self.cache_misses.with_label_values(&[operation]).inc();
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Decrements the in-progress gauge on drop, so cancelled requests are not leaked
pub struct InProgressGuard {
    gauge: prometheus::IntGauge,
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// `200` -> `"2xx"`
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_request("GET", "/api/v1/items", 200, 0.003);
        metrics.record_cache_hit("get_item");
        metrics.items_created.inc();

        let output = metrics.gather().unwrap();
        assert!(output.contains(
            r#"http_requests_total{method="GET",route="/api/v1/items",status_class="2xx"} 1"#
        ));
        assert!(output.contains("http_request_duration_seconds_bucket"));
        assert!(output.contains(r#"cache_hits_total{operation="get_item"} 1"#));
        assert!(output.contains("items_created_total 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.items_deleted.inc();

        assert_eq!(a.items_deleted.get(), 1);
        assert_eq!(b.items_deleted.get(), 0);
    }

    #[test]
    fn test_in_progress_guard() {
        let metrics = Metrics::new().unwrap();
        let gauge = metrics.http_in_progress.with_label_values(&["GET", "/healthz"]);
        {
            let _guard = metrics.track_in_progress("GET", "/healthz");
            assert_eq!(gauge.get(), 1);
        }
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(201), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(503), "5xx");
        assert_eq!(status_class(304), "3xx");
    }
}
