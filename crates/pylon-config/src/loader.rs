//! Layered configuration loading: defaults, then a file, then environment.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use pylon_core::{CheckFailurePolicy, ComputePlatform, ContractMode, KeyValidityPolicy};
use serde::de::DeserializeOwned;

use crate::error::{Format, Origin};
use crate::{ConfigError, GatewayConfig, LogFormat};

/// Loads a [`GatewayConfig`].
///
/// Environment variables use the form `PREFIX__SECTION__KEY`, e.g.
/// `PYLON__CONTROL__CHECK_TIMEOUT_MS=250`. List values are comma-separated.
/// Methods cannot be set from the environment.
///
/// # Example
///
/// ```no_run
/// use pylon_config::ConfigLoader;
///
/// # fn main() -> Result<(), pylon_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_file("gateway.toml")?
///     .with_env_prefix("PYLON")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatewayConfig::production();
        self
    }

    /// Replaces the configuration with the contents of a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, of an
    /// unknown format, or does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let format = Format::from_name(extension)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.config = parse(&content, format, Origin::File(path.to_path_buf()))?;
        Ok(self)
    }

    /// Like [`ConfigLoader::with_file`], but a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replaces the configuration with `content` in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, Format::from_name(format)?, Origin::Inline)?;
        Ok(self)
    }

    /// Sets the environment variable prefix for overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads variables from a `.env` file, if there is one.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<GatewayConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: BTreeMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in &vars {
                self.apply_env_var(key, value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> GatewayConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let field = parts.join(".").to_lowercase();
        let invalid = |reason: &str| ConfigError::env_override(key, field.as_str(), reason);
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVICE", "NAME"] => config.service.name = value.to_string(),
            ["SERVICE", "CONFIG_ID"] => config.service.config_id = value.to_string(),
            ["SERVICE", "PRODUCER_PROJECT_ID"] => {
                config.service.producer_project_id = value.to_string();
            }

            ["API_KEY", "QUERY_PARAMS"] => config.api_key.query_params = parse_list(value),
            ["API_KEY", "HEADERS"] => config.api_key.headers = parse_list(value),
            ["API_KEY", "VALIDITY_POLICY"] => {
                config.api_key.validity_policy =
                    parse_enum::<KeyValidityPolicy>(value).map_err(|e| invalid(e.as_str()))?;
            }

            ["CONTROL", "CHECK_TIMEOUT_MS"] => {
                config.control.check_timeout_ms = value
                    .parse()
                    .map_err(|_| invalid("expected integer"))?;
            }
            ["CONTROL", "FAILURE_POLICY"] => {
                config.control.failure_policy =
                    parse_enum::<CheckFailurePolicy>(value).map_err(|e| invalid(e.as_str()))?;
            }
            ["CONTROL", "REPORT_ENABLED"] => {
                config.control.report_enabled = parse_bool(value)
                    .ok_or_else(|| invalid("expected boolean"))?;
            }
            ["CONTROL", "CONTRACT_MODE"] => {
                config.control.contract_mode =
                    Some(parse_enum::<ContractMode>(value).map_err(|e| invalid(e.as_str()))?);
            }

            ["PLATFORM", "COMPUTE_PLATFORM"] => {
                config.platform.compute_platform =
                    parse_enum::<ComputePlatform>(value).map_err(|e| invalid(e.as_str()))?;
            }
            ["PLATFORM", "ZONE"] => config.platform.zone = value.to_string(),

            ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| invalid("expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),
            ["TELEMETRY", "TRACING", "ENABLED"] => {
                config.telemetry.tracing.enabled = parse_bool(value)
                    .ok_or_else(|| invalid("expected boolean"))?;
            }
            ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
                config.telemetry.tracing.otlp_endpoint =
                    (!value.is_empty()).then(|| value.to_string());
            }
            ["TELEMETRY", "TRACING", "SAMPLING_RATIO"] => {
                config.telemetry.tracing.sampling_ratio = value
                    .parse()
                    .map_err(|_| invalid("expected float"))?;
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool(value)
                    .ok_or_else(|| invalid("expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format =
                    parse_enum::<LogFormat>(value).map_err(|e| invalid(e.as_str()))?;
            }

            // Unknown keys are ignored so unrelated PYLON__* variables do not break startup.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: Format, origin: Origin) -> Result<GatewayConfig, ConfigError> {
    match format {
        Format::Toml => toml::from_str(content).map_err(|e| ConfigError::parse(origin, format, e)),
        Format::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::parse(origin, format, e))
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses a snake_case enum value through its serde representation.
fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase())).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [service]
        name = "library.example.com"
    "#;

    fn loader() -> ConfigLoader {
        ConfigLoader::new().with_string(MINIMAL, "toml").unwrap()
    }

    #[test]
    fn test_with_string_json() {
        let json = r#"{"service": {"name": "library.example.com", "config_id": "2024-01-01r0"}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.service.config_id, "2024-01-01r0");
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("name: x", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(f)) if f == "yaml"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ConfigLoader::new().with_file("/nonexistent/gateway.toml"),
            Err(ConfigError::FileNotFound(path)) if path.ends_with("gateway.toml")
        ));
    }

    #[test]
    fn test_optional_missing_file_keeps_current() {
        let config = loader()
            .with_optional_file("/nonexistent/gateway.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.service.name, "library.example.com");
    }

    #[test]
    fn test_load_validates() {
        assert!(ConfigLoader::new().load().is_err());
        assert!(loader().load().is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("key, api_key,,token"), vec!["key", "api_key", "token"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_apply_env_var_sections() {
        let mut loader = loader();
        loader.apply_env_var("T__SERVICE__CONFIG_ID", "cfg-7", "T").unwrap();
        loader.apply_env_var("T__API_KEY__HEADERS", "x-api-key,x-goog-api-key", "T").unwrap();
        loader.apply_env_var("T__API_KEY__VALIDITY_POLICY", "PESSIMISTIC", "T").unwrap();
        loader.apply_env_var("T__CONTROL__CHECK_TIMEOUT_MS", "250", "T").unwrap();
        loader.apply_env_var("T__CONTROL__FAILURE_POLICY", "fail_open", "T").unwrap();
        loader.apply_env_var("T__PLATFORM__COMPUTE_PLATFORM", "kubernetes", "T").unwrap();
        loader.apply_env_var("T__TELEMETRY__LOGGING__FORMAT", "pretty", "T").unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.service.config_id, "cfg-7");
        assert_eq!(config.api_key.headers, vec!["x-api-key", "x-goog-api-key"]);
        assert_eq!(config.api_key.validity_policy, KeyValidityPolicy::Pessimistic);
        assert_eq!(config.control.check_timeout_ms, 250);
        assert_eq!(config.control.failure_policy, CheckFailurePolicy::FailOpen);
        assert_eq!(config.platform.compute_platform, ComputePlatform::Kubernetes);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_apply_env_var_rejects_bad_values() {
        let mut loader = loader();
        assert!(loader
            .apply_env_var("T__CONTROL__CHECK_TIMEOUT_MS", "soon", "T")
            .is_err());
        assert!(loader
            .apply_env_var("T__CONTROL__FAILURE_POLICY", "fail_sideways", "T")
            .is_err());
        assert!(loader
            .apply_env_var("T__CONTROL__REPORT_ENABLED", "maybe", "T")
            .is_err());
    }

    #[test]
    fn test_env_override_error_names_setting() {
        let err = loader()
            .apply_env_var("T__TELEMETRY__TRACING__SAMPLING_RATIO", "most", "T")
            .unwrap_err();
        assert_eq!(err.field(), Some("telemetry.tracing.sampling_ratio"));
        assert!(matches!(
            err,
            ConfigError::EnvOverride { ref var, .. } if var == "T__TELEMETRY__TRACING__SAMPLING_RATIO"
        ));
    }

    #[test]
    fn test_inline_parse_error_is_tagged() {
        let err = ConfigLoader::new().with_string("{", "json").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parse { origin: Origin::Inline, format: Format::Json, .. }
        ));
    }

    #[test]
    fn test_apply_env_var_ignores_unknown() {
        let mut loader = loader();
        assert!(loader.apply_env_var("T__SERVER__HTTP_ADDR", "x", "T").is_ok());
    }
}
