pub mod server;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Header sync
    latest_head: IntGauge,
    forwarded_height: IntGauge,
    headers_forwarded: IntCounterVec,
    ancestry_forward_failures: IntCounterVec,
    rpc_retries: IntCounterVec,
    // Epoch proof cache
    epoch_current: IntGauge,
    epoch_cache_loads: IntCounterVec,
    epoch_cache_load_time: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let latest_head = IntGauge::with_opts(Opts::new("relayer_latest_head", "Number of the latest observed PoW head")).unwrap();
        registry.register(Box::new(latest_head.clone())).unwrap();

        let forwarded_height = IntGauge::with_opts(Opts::new("relayer_forwarded_height", "Number of the last header pushed to the output queue")).unwrap();
        registry.register(Box::new(forwarded_height.clone())).unwrap();

        let headers_forwarded = IntCounterVec::new(
            Opts::new("relayer_headers_forwarded_total", "Total number of headers pushed to the output queue"),
            &["source"],
        ).unwrap();
        registry.register(Box::new(headers_forwarded.clone())).unwrap();

        let ancestry_forward_failures = IntCounterVec::new(
            Opts::new("relayer_ancestry_forward_failures_total", "Total number of failed ancestry walks"),
            &[],
        ).unwrap();
        registry.register(Box::new(ancestry_forward_failures.clone())).unwrap();

        let rpc_retries = IntCounterVec::new(
            Opts::new("relayer_rpc_retries_total", "Total number of retried header requests"),
            &["call"],
        ).unwrap();
        registry.register(Box::new(rpc_retries.clone())).unwrap();

        let epoch_current = IntGauge::with_opts(Opts::new("relayer_epoch_current", "Epoch of the current ethash proof cache")).unwrap();
        registry.register(Box::new(epoch_current.clone())).unwrap();

        let epoch_cache_loads = IntCounterVec::new(
            Opts::new("relayer_epoch_cache_loads_total", "Total number of epoch proof cache loads"),
            &["mode"],
        ).unwrap();
        registry.register(Box::new(epoch_cache_loads.clone())).unwrap();

        let epoch_cache_load_time = HistogramVec::new(
            HistogramOpts::new("relayer_epoch_cache_load_time_seconds", "Time taken to load an epoch proof cache")
                .buckets(vec![0.1, 1.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(epoch_cache_load_time.clone())).unwrap();

        Self {
            registry,
            latest_head,
            forwarded_height,
            headers_forwarded,
            ancestry_forward_failures,
            rpc_retries,
            epoch_current,
            epoch_cache_loads,
            epoch_cache_load_time,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics not utf8")
    }

    // Header sync
    pub fn set_latest_head(&self, v: u64) {
        self.latest_head.set(v as i64);
    }

    pub fn set_forwarded_height(&self, v: u64) {
        self.forwarded_height.set(v as i64);
    }

    pub fn inc_headers_forwarded(&self, source: &str) {
        self.headers_forwarded.with_label_values(&[source]).inc();
    }

    pub fn inc_ancestry_forward_failures(&self) {
        self.ancestry_forward_failures.with_label_values::<&str>(&[]).inc();
    }

    pub fn inc_rpc_retries(&self, call: &str) {
        self.rpc_retries.with_label_values(&[call]).inc();
    }

    // Epoch proof cache
    pub fn set_epoch_current(&self, v: u64) {
        self.epoch_current.set(v as i64);
    }

    pub fn inc_epoch_cache_loads(&self, mode: &str) {
        self.epoch_cache_loads.with_label_values(&[mode]).inc();
    }

    pub fn observe_epoch_cache_load_time(&self, duration: f64) {
        self.epoch_cache_load_time.with_label_values::<&str>(&[]).observe(duration);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<Metrics>;
