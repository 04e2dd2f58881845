//! Prometheus metrics for the gateway.
//!
//! Recording goes through the `metrics` facade, so the helpers below are
//! cheap no-ops until [`init_metrics`] installs the Prometheus recorder.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Check outcomes, labelled by `status`.
pub const CHECKS_TOTAL: &str = "pylon_checks_total";
/// Check round-trip latency.
pub const CHECK_DURATION_SECONDS: &str = "pylon_check_duration_seconds";
/// Report dispatch outcomes, labelled by `result`.
pub const REPORTS_TOTAL: &str = "pylon_reports_total";
/// Calls that matched no configured method.
pub const ROUTING_FAILURES_TOTAL: &str = "pylon_routing_failures_total";
/// Repeated or out-of-order request context calls, labelled by `kind`.
pub const CONTRACT_VIOLATIONS_TOTAL: &str = "pylon_contract_violations_total";
/// Request contexts currently alive.
pub const IN_FLIGHT_REQUESTS: &str = "pylon_in_flight_requests";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus recorder is installed.
    pub enabled: bool,

    /// Listen address for the scrape endpoint.
    pub addr: String,

    /// Histogram buckets for Check latency, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            // 1ms .. 5s; Check is expected to answer well under a second
            duration_buckets: vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        }
    }
}

/// Installs the Prometheus recorder and scrape listener.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsAddr` for a bad listen address and
/// `TelemetryError::Metrics` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|source| TelemetryError::MetricsAddr {
            addr: config.addr.clone(),
            source,
        })?;

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(CHECK_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format, if the recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(CHECKS_TOTAL, "Check outcomes by status");
    describe_histogram!(CHECK_DURATION_SECONDS, "Check round-trip latency in seconds");
    describe_counter!(REPORTS_TOTAL, "Report dispatch outcomes by result");
    describe_counter!(ROUTING_FAILURES_TOTAL, "Calls that matched no configured method");
    describe_counter!(
        CONTRACT_VIOLATIONS_TOTAL,
        "Repeated or out-of-order request context calls by kind"
    );
    describe_gauge!(IN_FLIGHT_REQUESTS, "Request contexts currently alive");
}

/// Records one Check outcome and, when it went to the control plane, its latency.
pub fn record_check(status: &str, duration: Option<Duration>) {
    counter!(CHECKS_TOTAL, "status" => status.to_string()).increment(1);
    if let Some(duration) = duration {
        histogram!(CHECK_DURATION_SECONDS).record(duration.as_secs_f64());
    }
}

/// Records one Report dispatch outcome (`sent`, `failed`, `no_runtime`).
pub fn record_report(result: &str) {
    counter!(REPORTS_TOTAL, "result" => result.to_string()).increment(1);
}

/// Records a call that matched no configured method.
pub fn record_routing_failure() {
    counter!(ROUTING_FAILURES_TOTAL).increment(1);
}

/// Records a repeated or out-of-order request context call.
pub fn record_contract_violation(kind: &str) {
    counter!(CONTRACT_VIOLATIONS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Keeps `pylon_in_flight_requests` raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge; dropping the guard decrements it.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disabled_metrics_is_noop() {
        assert!(init_metrics(&MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::MetricsAddr { .. })
        ));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_check("ok", Some(Duration::from_millis(12)));
        record_check("key_missing", None);
        record_report("sent");
        record_routing_failure();
        record_contract_violation("complete_check_twice");
        let guard = InFlightGuard::new();
        drop(guard);
    }
}
