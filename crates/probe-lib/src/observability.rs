//! Prometheus metrics for the probe itself
//!
//! Registered once in a global handle; the axum API server exposes them on
//! `/metrics`. These describe the probe's own behavior, not the discovered
//! cluster (cluster data goes upstream as entities).

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

const CYCLE_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<ProbeMetricsInner> = OnceLock::new();

struct ProbeMetricsInner {
    cycle_latency_seconds: Histogram,
    agents_discovered: IntGauge,
    tasks_running: IntGauge,
    entities_emitted: IntGauge,
    cycle_errors: IntGauge,
    cycles_total: IntGauge,
}

impl ProbeMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "mesos_probe_cycle_latency_seconds",
                "End-to-end duration of one discovery cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("register cycle_latency_seconds"),
            agents_discovered: register_int_gauge!(
                "mesos_probe_agents_discovered",
                "Agents seen in the last cluster snapshot"
            )
            .expect("register agents_discovered"),
            tasks_running: register_int_gauge!(
                "mesos_probe_tasks_running",
                "Running tasks seen in the last cluster snapshot"
            )
            .expect("register tasks_running"),
            entities_emitted: register_int_gauge!(
                "mesos_probe_entities_emitted",
                "Entities emitted by the last discovery cycle"
            )
            .expect("register entities_emitted"),
            cycle_errors: register_int_gauge!(
                "mesos_probe_cycle_errors",
                "Per-agent errors collected in the last discovery cycle"
            )
            .expect("register cycle_errors"),
            cycles_total: register_int_gauge!(
                "mesos_probe_cycles_total",
                "Discovery cycles completed since startup"
            )
            .expect("register cycles_total"),
        }
    }
}

/// Cheap cloneable handle to the global metrics.
#[derive(Clone)]
pub struct ProbeMetrics {
    _private: (),
}

impl Default for ProbeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ProbeMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ProbeMetricsInner {
        GLOBAL_METRICS.get().expect("metrics not initialized")
    }

    pub fn observe_cycle_latency(&self, seconds: f64) {
        self.inner().cycle_latency_seconds.observe(seconds);
    }

    pub fn record_snapshot(&self, agents: usize, running_tasks: usize) {
        self.inner().agents_discovered.set(agents as i64);
        self.inner().tasks_running.set(running_tasks as i64);
    }

    pub fn record_cycle(&self, entities: usize, errors: usize) {
        self.inner().entities_emitted.set(entities as i64);
        self.inner().cycle_errors.set(errors as i64);
        self.inner().cycles_total.inc();
    }
}

/// Structured lifecycle logging with consistent fields.
#[derive(Clone)]
pub struct ProbeLogger {
    target: String,
}

impl ProbeLogger {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "probe_started",
            target = %self.target,
            version = %version,
            "mesos probe started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "probe_shutdown",
            target = %self.target,
            reason = %reason,
            "mesos probe shutting down"
        );
    }

    pub fn log_cycle(&self, entities: usize, errors: usize, elapsed_ms: u128) {
        info!(
            event = "discovery_cycle",
            target = %self.target,
            entities = entities,
            errors = errors,
            elapsed_ms = elapsed_ms,
            "discovery cycle complete"
        );
    }

    pub fn log_cycle_failure(&self, error: &str) {
        warn!(
            event = "discovery_cycle_failed",
            target = %self.target,
            error = %error,
            "discovery cycle failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_handle_records_without_panicking() {
        let metrics = ProbeMetrics::new();
        metrics.observe_cycle_latency(0.42);
        metrics.record_snapshot(3, 7);
        metrics.record_cycle(17, 1);
    }

    #[test]
    fn logger_keeps_target() {
        let logger = ProbeLogger::new("10.0.0.5:5050");
        assert_eq!(logger.target, "10.0.0.5:5050");
        logger.log_cycle(10, 0, 120);
    }
}
