use prometheus::{
    exponential_buckets, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry,
};
use std::time::Duration;

use crate::pool::PoolObserver;

/// Counter tables and latency accumulators updated on every completion.
pub struct Metrics {
    pub registry: Registry,
    pub incoming_requests: IntCounter,
    pub rejected_overload: IntCounter,
    pub request_latency: Histogram,
    pub cache_latency: Histogram,
    pub hss_latency: Histogram,
    pub hss_digest_latency: Histogram,
    pub hss_subscription_latency: Histogram,
    pub cx_results: IntCounterVec,
    pub task_duration: HistogramVec,
    pub task_failures: IntCounterVec,
}

fn latency_buckets() -> Vec<f64> {
    // 100us up through ~1.6s
    exponential_buckets(0.0001, 2.0, 15).unwrap()
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let incoming_requests = IntCounter::with_opts(Opts::new(
            "hsgw_incoming_requests_total",
            "Subscriber-state requests received",
        ))
        .unwrap();

        let rejected_overload = IntCounter::with_opts(Opts::new(
            "hsgw_rejected_overload_total",
            "Requests rejected because the work queue was full",
        ))
        .unwrap();

        let request_latency = Histogram::with_opts(
            HistogramOpts::new("hsgw_request_latency_seconds", "End-to-end request latency")
                .buckets(latency_buckets()),
        )
        .unwrap();

        let cache_latency = Histogram::with_opts(
            HistogramOpts::new("hsgw_cache_latency_seconds", "IRS cache operation latency")
                .buckets(latency_buckets()),
        )
        .unwrap();

        let hss_latency = Histogram::with_opts(
            HistogramOpts::new("hsgw_hss_latency_seconds", "HSS connection latency, all requests")
                .buckets(latency_buckets()),
        )
        .unwrap();

        let hss_digest_latency = Histogram::with_opts(
            HistogramOpts::new(
                "hsgw_hss_digest_latency_seconds",
                "HSS connection latency, multimedia-auth requests",
            )
            .buckets(latency_buckets()),
        )
        .unwrap();

        let hss_subscription_latency = Histogram::with_opts(
            HistogramOpts::new(
                "hsgw_hss_subscription_latency_seconds",
                "HSS connection latency, subscription requests",
            )
            .buckets(latency_buckets()),
        )
        .unwrap();

        let cx_results = IntCounterVec::new(
            Opts::new("hsgw_cx_results_total", "Cx answers by command and result code"),
            &["command", "result"],
        )
        .unwrap();

        let task_duration = HistogramVec::new(
            HistogramOpts::new("hsgw_task_duration_seconds", "Worker-pool task duration")
                .buckets(latency_buckets()),
            &["task"],
        )
        .unwrap();

        let task_failures = IntCounterVec::new(
            Opts::new("hsgw_task_failures_total", "Worker-pool tasks that failed or panicked"),
            &["task"],
        )
        .unwrap();

        registry.register(Box::new(incoming_requests.clone())).unwrap();
        registry.register(Box::new(rejected_overload.clone())).unwrap();
        registry.register(Box::new(request_latency.clone())).unwrap();
        registry.register(Box::new(cache_latency.clone())).unwrap();
        registry.register(Box::new(hss_latency.clone())).unwrap();
        registry.register(Box::new(hss_digest_latency.clone())).unwrap();
        registry.register(Box::new(hss_subscription_latency.clone())).unwrap();
        registry.register(Box::new(cx_results.clone())).unwrap();
        registry.register(Box::new(task_duration.clone())).unwrap();
        registry.register(Box::new(task_failures.clone())).unwrap();

        Self {
            registry,
            incoming_requests,
            rejected_overload,
            request_latency,
            cache_latency,
            hss_latency,
            hss_digest_latency,
            hss_subscription_latency,
            cx_results,
            task_duration,
            task_failures,
        }
    }

    pub fn observe_cache_latency(&self, duration: Duration) {
        self.cache_latency.observe(duration.as_secs_f64());
    }

    pub fn record_cx_result(&self, command: &str, result: i32) {
        self.cx_results
            .with_label_values(&[command, &result.to_string()])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolObserver for Metrics {
    fn task_complete(&self, label: &str, duration: Duration, ok: bool) {
        self.task_duration
            .with_label_values(&[label])
            .observe(duration.as_secs_f64());
        if !ok {
            self.task_failures.with_label_values(&[label]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_tables_once() {
        let metrics = Metrics::new();
        metrics.incoming_requests.inc();
        metrics.record_cx_result("MAR", 2001);
        metrics.record_cx_result("MAR", 2001);
        metrics.record_cx_result("SAR", 5065);
        assert_eq!(metrics.cx_results.with_label_values(&["MAR", "2001"]).get(), 2);
        assert_eq!(metrics.cx_results.with_label_values(&["SAR", "5065"]).get(), 1);
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn pool_observer_counts_failures() {
        let metrics = Metrics::new();
        metrics.task_complete("op", Duration::from_millis(1), true);
        metrics.task_complete("op", Duration::from_millis(1), false);
        assert_eq!(metrics.task_failures.with_label_values(&["op"]).get(), 1);
    }
}
