//! OTLP span export.
//!
//! Request spans are ordinary `tracing` spans; this module only wires up the
//! OpenTelemetry tracer provider that ships them to a collector.

use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, TracerProvider};
use opentelemetry_sdk::Resource;

use crate::config::GatewayIdentity;
use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Span export settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Export spans at all.
    pub enabled: bool,
    /// OTLP gRPC collector, e.g. `http://localhost:4317`.
    pub otlp_endpoint: String,
    /// Fraction of calls without an inbound `traceparent` that start a
    /// sampled trace. Calls with one follow the caller's decision.
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            sample_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    fn root_sampler(&self) -> Sampler {
        match self.sample_ratio {
            r if r >= 1.0 => Sampler::AlwaysOn,
            r if r <= 0.0 => Sampler::AlwaysOff,
            r => Sampler::TraceIdRatioBased(r),
        }
    }
}

/// Builds and installs the global tracer provider, with `identity` as the
/// exported resource.
///
/// Must run inside a Tokio runtime; the batch exporter spawns onto it.
///
/// # Errors
///
/// Returns `TelemetryError::Export` if the exporter cannot be built.
pub fn init_tracing(
    config: &TracingConfig,
    identity: &GatewayIdentity,
) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::Export {
            endpoint: config.otlp_endpoint.clone(),
            reason: e.to_string(),
        })?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(Sampler::ParentBased(Box::new(config.root_sampler())))
        .with_resource(Resource::new(identity.resource_attributes()))
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(Some(provider))
}
