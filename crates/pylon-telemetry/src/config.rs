//! Who the gateway is, and what it exports.

use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use crate::tracing::TracingConfig;

/// Resource attribute carrying the service config rollout id.
pub const SERVICE_CONFIG_ID: &str = "pylon.service_config_id";

/// The managed service a gateway fronts, as it appears in exported telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIdentity {
    /// Managed service name, e.g. `library.example.com`.
    pub service_name: String,
    /// Id of the service config being enforced. Empty when unknown.
    pub service_config_id: String,
    /// Deployment environment.
    pub environment: String,
    /// Pylon build version.
    pub gateway_version: &'static str,
}

impl GatewayIdentity {
    /// An identity for `service_name` in the `development` environment.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_config_id: String::new(),
            environment: "development".to_string(),
            gateway_version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Sets the service config id.
    #[must_use]
    pub fn with_config_id(mut self, config_id: impl Into<String>) -> Self {
        self.service_config_id = config_id.into();
        self
    }

    /// Sets the deployment environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub(crate) fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, self.gateway_version),
            KeyValue::new("deployment.environment", self.environment.clone()),
        ];
        if !self.service_config_id.is_empty() {
            attributes.push(KeyValue::new(SERVICE_CONFIG_ID, self.service_config_id.clone()));
        }
        attributes
    }
}

/// Settings for every telemetry subsystem of one gateway.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Stamped on exported spans and the startup log line.
    pub identity: GatewayIdentity,
    /// Log output.
    pub logging: LogConfig,
    /// Prometheus listener.
    pub metrics: MetricsConfig,
    /// OTLP span export.
    pub tracing: TracingConfig,
}

impl TelemetryConfig {
    /// JSON logs at `info`. No metrics listener and no span export.
    #[must_use]
    pub fn new(identity: GatewayIdentity) -> Self {
        Self {
            identity,
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
            tracing: TracingConfig::default(),
        }
    }

    /// Nothing installed. For hosts that own the global subscriber and recorder.
    #[must_use]
    pub fn disabled(identity: GatewayIdentity) -> Self {
        let mut config = Self::new(identity);
        config.logging.enabled = false;
        config.metrics.enabled = false;
        config.tracing.enabled = false;
        config
    }
}
