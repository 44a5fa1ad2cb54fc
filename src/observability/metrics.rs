use prometheus::{
    Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

use crate::observability::events::{CallEvent, EventSink};

/// Prometheus collectors for the access layer. One instance per host,
/// owned by whoever builds the client.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Call metrics
    pub calls: IntCounterVec,
    pub call_attempts: HistogramVec,
    pub call_wait: HistogramVec,
    pub call_duration: HistogramVec,

    // Cache metrics
    pub cache_hits: IntCounterVec,
    pub cache_misses: IntCounter,
    pub cache_write_failures: IntCounter,

    // runtime
    pub up: IntGauge,

    // === Service resource metrics ===
    pub process_cpu_usage: Gauge,
    pub process_memory_usage: IntGauge,
    pub process_start_time: IntGauge,
    pub process_uptime: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("apiagent".into()), None)?;

        let metrics = Self {
            calls: IntCounterVec::new(Opts::new("calls_total", "Terminal call outcomes"), &["method", "outcome"])?,
            call_attempts: HistogramVec::new(HistogramOpts::new("call_attempts", "Dispatch attempts per call").buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0]), &["outcome"])?,
            call_wait: HistogramVec::new(HistogramOpts::new("call_wait_seconds", "Admission and backoff wait per call").buckets(vec![0.0, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]), &["outcome"])?,
            call_duration: HistogramVec::new(HistogramOpts::new("call_duration_seconds", "Call duration seconds").buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["outcome"])?,

            cache_hits: IntCounterVec::new(Opts::new("cache_hits_total", "Cache hits by tier"), &["tier"])?,
            cache_misses: IntCounter::new("cache_misses_total", "Cacheable calls that went upstream")?,
            cache_write_failures: IntCounter::new("cache_write_failures_total", "Soft cache write failures")?,

            up: IntGauge::new("up", "1 if service is healthy")?,
            process_cpu_usage: Gauge::new("process_cpu_usage_percent", "CPU usage % of this process")?,
            process_memory_usage: IntGauge::new("process_memory_usage_bytes", "Resident memory used by this process")?,
            process_start_time: IntGauge::new("process_start_time_seconds", "Process start time (UNIX seconds)")?,
            process_uptime: IntGauge::new("process_uptime_seconds", "Process uptime seconds")?,

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.calls.clone()))?;
        reg.register(Box::new(metrics.call_attempts.clone()))?;
        reg.register(Box::new(metrics.call_wait.clone()))?;
        reg.register(Box::new(metrics.call_duration.clone()))?;
        reg.register(Box::new(metrics.cache_hits.clone()))?;
        reg.register(Box::new(metrics.cache_misses.clone()))?;
        reg.register(Box::new(metrics.cache_write_failures.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;
        reg.register(Box::new(metrics.process_cpu_usage.clone()))?;
        reg.register(Box::new(metrics.process_memory_usage.clone()))?;
        reg.register(Box::new(metrics.process_start_time.clone()))?;
        reg.register(Box::new(metrics.process_uptime.clone()))?;

        Ok(metrics)
    }
}

/// Feeds call events into the prometheus collectors.
#[derive(Clone)]
pub struct MetricsSink {
    metrics: Metrics,
}

impl MetricsSink {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl EventSink for MetricsSink {
    fn record(&self, event: &CallEvent) {
        let outcome = event.outcome.as_str();
        let m = &self.metrics;
        m.calls.with_label_values(&[event.method.as_str(), outcome]).inc();
        m.call_attempts.with_label_values(&[outcome]).observe(event.attempts as f64);
        m.call_wait.with_label_values(&[outcome]).observe(event.total_wait.as_secs_f64());
        m.call_duration.with_label_values(&[outcome]).observe(event.elapsed.as_secs_f64());

        match event.cache_tier {
            Some(tier) => m.cache_hits.with_label_values(&[tier.as_str()]).inc(),
            None if event.attempts > 0 => m.cache_misses.inc(),
            None => {}
        }
        if event.cache_write_failed {
            m.cache_write_failures.inc();
        }
    }
}
