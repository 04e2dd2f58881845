//! Observability for the Pylon gateway.
//!
//! - **Logging**: structured JSON (or pretty) output through `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` facade
//! - **Tracing**: optional OTLP span export through OpenTelemetry
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `pylon_checks_total` | Counter | `status` | Check outcomes |
//! | `pylon_check_duration_seconds` | Histogram | - | Check round-trip latency |
//! | `pylon_reports_total` | Counter | `result` | Report dispatch outcomes |
//! | `pylon_routing_failures_total` | Counter | - | Calls with no matching method |
//! | `pylon_contract_violations_total` | Counter | `kind` | Out-of-order or repeated context calls |
//! | `pylon_in_flight_requests` | Gauge | - | Request contexts alive |
//!
//! # Example
//!
//! ```rust,ignore
//! use pylon_telemetry::{init_telemetry, GatewayIdentity, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let identity = GatewayIdentity::new("library.example.com")
//!         .with_config_id("2024-05-01r3")
//!         .with_environment("production");
//!     let mut config = TelemetryConfig::new(identity);
//!     config.metrics.enabled = true;
//!     config.tracing.enabled = true;
//!
//!     let _guard = init_telemetry(config).expect("telemetry init");
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use config::{GatewayIdentity, TelemetryConfig};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use self::metrics::{init_metrics, InFlightGuard, MetricsConfig};
pub use self::tracing::{init_tracing, TracingConfig};

/// Result of bringing up a telemetry subsystem.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Keeps span export running for the life of the gateway.
///
/// Dropping it shuts the tracer provider down, which flushes spans still
/// buffered in the batch processor.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    exporter: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl TelemetryGuard {
    /// True when spans are shipped to a collector.
    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporter.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.exporter.take() else {
            return;
        };
        // the subscriber may already be gone at this point
        if let Err(e) = provider.shutdown() {
            eprintln!("pylon: span export did not shut down cleanly: {e}");
        }
    }
}

/// Initializes logging, metrics and span export, in that order.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    let tracer_provider = init_tracing(&config.tracing, &config.identity)?;

    let identity = &config.identity;
    ::tracing::info!(
        service.name = %identity.service_name,
        service.config_id = %identity.service_config_id,
        environment = %identity.environment,
        version = identity.gateway_version,
        metrics = config.metrics.enabled,
        otlp = tracer_provider.is_some(),
        "telemetry initialized"
    );

    Ok(TelemetryGuard {
        exporter: tracer_provider,
    })
}
