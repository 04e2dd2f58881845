//! The top-level [`GatewayConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use pylon_telemetry::{GatewayIdentity, LogConfig, LogOutput, MetricsConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::{
    ApiKeySection, ConfigError, ControlSection, LogFormat, MethodSection, PlatformSection,
    ServiceSection, TelemetrySection,
};

/// Complete gateway configuration.
///
/// # Example
///
/// ```
/// use pylon_config::GatewayConfig;
///
/// let config: GatewayConfig = toml::from_str(r#"
///     [service]
///     name = "library.example.com"
///
///     [[methods]]
///     selector = "items.get"
///     http_method = "GET"
///     path = "/v1/items"
/// "#).unwrap();
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.api_key.query_params, vec!["key", "api_key"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Managed service identity.
    #[serde(default)]
    pub service: ServiceSection,

    /// API key lookup.
    #[serde(default)]
    pub api_key: ApiKeySection,

    /// Check and Report behavior.
    #[serde(default)]
    pub control: ControlSection,

    /// Hosting platform.
    #[serde(default)]
    pub platform: PlatformSection,

    /// Logging, metrics and span export.
    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// API methods and their routes.
    #[serde(default)]
    pub methods: Vec<MethodSection>,
}

impl GatewayConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Development preset: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();
        config
    }

    /// Production preset: JSON logs and metrics on.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config.telemetry.environment = "production".to_string();
        config
    }

    /// Deadline for the Check RPC.
    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.control.check_timeout_ms)
    }

    /// Checks values serde cannot check on its own.
    ///
    /// Route conflicts are detected later, when the routing table is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::invalid_value("service.name", "must not be empty"));
        }

        if self.control.check_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "control.check_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.api_key.query_params.iter().any(String::is_empty)
            || self.api_key.headers.iter().any(String::is_empty)
        {
            return Err(ConfigError::invalid_value(
                "api_key",
                "parameter and header names must not be empty",
            ));
        }

        if self.telemetry.metrics.enabled
            && self.telemetry.metrics.addr.parse::<SocketAddr>().is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        if !(0.0..=1.0).contains(&self.telemetry.tracing.sampling_ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.sampling_ratio",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.telemetry.tracing.enabled && self.telemetry.tracing.otlp_endpoint.is_none() {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.otlp_endpoint",
                "required when tracing is enabled",
            ));
        }

        for (index, method) in self.methods.iter().enumerate() {
            validate_method(index, method)?;
        }

        Ok(())
    }

    /// Builds the telemetry subsystem configuration, stamped with this
    /// service's name and config id.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let section = &self.telemetry;
        let identity = GatewayIdentity::new(&self.service.name)
            .with_config_id(&self.service.config_id)
            .with_environment(&section.environment);
        let mut config = TelemetryConfig::new(identity);

        config.logging = LogConfig {
            enabled: section.logging.enabled,
            filter: section.logging.level.clone(),
            output: match section.logging.format {
                LogFormat::Json => LogOutput::Json,
                LogFormat::Pretty => LogOutput::Pretty,
            },
            include_location: section.logging.include_location,
        };
        config.metrics = MetricsConfig {
            enabled: section.metrics.enabled,
            addr: section.metrics.addr.clone(),
            duration_buckets: section.metrics.histogram_buckets.clone(),
        };
        config.tracing.enabled = section.tracing.enabled;
        config.tracing.sample_ratio = section.tracing.sampling_ratio;
        if let Some(endpoint) = &section.tracing.otlp_endpoint {
            config.tracing.otlp_endpoint.clone_from(endpoint);
        }
        config
    }
}

fn validate_method(index: usize, method: &MethodSection) -> Result<(), ConfigError> {
    let field = |name: &str| format!("methods[{index}].{name}");

    if method.selector.trim().is_empty() {
        return Err(ConfigError::invalid_value(field("selector"), "must not be empty"));
    }
    if method.http_method != "*" && http::Method::from_bytes(method.http_method.as_bytes()).is_err()
    {
        return Err(ConfigError::invalid_value(
            field("http_method"),
            format!("not an HTTP method: {}", method.http_method),
        ));
    }
    if !method.path.starts_with('/') {
        return Err(ConfigError::invalid_value(
            field("path"),
            format!("must start with '/': {}", method.path),
        ));
    }
    Ok(())
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the managed service name.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.config.service.name = name.to_string();
        self
    }

    /// Sets the service section.
    #[must_use]
    pub fn service(mut self, service: ServiceSection) -> Self {
        self.config.service = service;
        self
    }

    /// Sets the API key section.
    #[must_use]
    pub fn api_key(mut self, api_key: ApiKeySection) -> Self {
        self.config.api_key = api_key;
        self
    }

    /// Sets the control section.
    #[must_use]
    pub fn control(mut self, control: ControlSection) -> Self {
        self.config.control = control;
        self
    }

    /// Sets the platform section.
    #[must_use]
    pub fn platform(mut self, platform: PlatformSection) -> Self {
        self.config.platform = platform;
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodSection) -> Self {
        self.config.methods.push(method);
        self
    }

    /// Builds the configuration without validating it.
    #[must_use]
    pub fn build(self) -> GatewayConfig {
        self.config
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<GatewayConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
