//! Configuration section types.

use std::collections::BTreeMap;

use pylon_core::{
    CheckFailurePolicy, ComputePlatform, ContractMode, KeyValidityPolicy, MethodInfo,
};
use serde::{Deserialize, Serialize};

/// Identity of the managed service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    /// Managed service name, e.g. `library.example.com`. Required.
    #[serde(default)]
    pub name: String,

    /// Id of the service configuration rollout.
    #[serde(default)]
    pub config_id: String,

    /// Project that owns the service.
    #[serde(default)]
    pub producer_project_id: String,
}

/// Where API keys are looked for, and how their validity starts out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiKeySection {
    /// Query parameters checked first, in order.
    #[serde(default = "default_query_params")]
    pub query_params: Vec<String>,

    /// Headers checked after the query parameters, in order.
    #[serde(default = "default_headers")]
    pub headers: Vec<String>,

    /// Starting value of `is_api_key_valid`.
    #[serde(default)]
    pub validity_policy: KeyValidityPolicy,
}

impl Default for ApiKeySection {
    fn default() -> Self {
        Self {
            query_params: default_query_params(),
            headers: default_headers(),
            validity_policy: KeyValidityPolicy::default(),
        }
    }
}

fn default_query_params() -> Vec<String> {
    vec!["key".to_string(), "api_key".to_string()]
}

fn default_headers() -> Vec<String> {
    vec!["x-api-key".to_string()]
}

/// Check and Report behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ControlSection {
    /// Deadline for the Check RPC.
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// What happens when Check cannot reach the control plane.
    #[serde(default)]
    pub failure_policy: CheckFailurePolicy,

    /// Whether Reports are sent at all.
    #[serde(default = "default_true")]
    pub report_enabled: bool,

    /// How repeated context calls are surfaced; unset follows the build profile.
    #[serde(default)]
    pub contract_mode: Option<ContractMode>,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_check_timeout_ms(),
            failure_policy: CheckFailurePolicy::default(),
            report_enabled: true,
            contract_mode: None,
        }
    }
}

fn default_check_timeout_ms() -> u64 {
    1000
}

/// Where the gateway runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlatformSection {
    /// Compute platform recorded in Reports.
    #[serde(default)]
    pub compute_platform: ComputePlatform,

    /// Zone used as the Report location when no resolver answers.
    #[serde(default)]
    pub zone: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,

    /// Check latency histogram buckets, in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
}

/// Span export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TracingSection {
    /// Export spans over OTLP.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Sampling ratio (0.0 to 1.0).
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

impl Default for TracingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

fn default_sampling_ratio() -> f64 {
    1.0
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a log subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Span export configuration.
    #[serde(default)]
    pub tracing: TracingSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            metrics: MetricsSection::default(),
            tracing: TracingSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

/// One API method and the route that reaches it.
///
/// ```toml
/// [[methods]]
/// selector = "items.get"
/// http_method = "GET"
/// path = "/v1/items/{id}"
/// metric_costs = { read_requests = 1 }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MethodSection {
    /// Fully qualified method name.
    pub selector: String,

    /// HTTP method, or `*` for any.
    pub http_method: String,

    /// Path template.
    pub path: String,

    /// Callers may omit the API key.
    #[serde(default)]
    pub allow_unregistered_calls: bool,

    /// An authentication provider guards the method.
    #[serde(default)]
    pub requires_auth: bool,

    /// Query parameters replacing `[api_key].query_params` for this method.
    #[serde(default)]
    pub api_key_query_params: Option<Vec<String>>,

    /// Headers replacing `[api_key].headers` for this method.
    #[serde(default)]
    pub api_key_headers: Option<Vec<String>>,

    /// Bypass Check and Report.
    #[serde(default)]
    pub skip_service_control: bool,

    /// Quota metric costs per call.
    #[serde(default)]
    pub metric_costs: BTreeMap<String, i64>,

    /// Request field the body maps to.
    #[serde(default)]
    pub body: Option<String>,
}

impl MethodSection {
    /// Builds the immutable descriptor for this method.
    #[must_use]
    pub fn to_method_info(&self) -> MethodInfo {
        let mut builder = MethodInfo::builder(&self.selector)
            .allow_unregistered_calls(self.allow_unregistered_calls)
            .requires_auth(self.requires_auth)
            .skip_service_control(self.skip_service_control);

        for name in self.api_key_query_params.iter().flatten() {
            builder = builder.api_key_query_param(name);
        }
        for name in self.api_key_headers.iter().flatten() {
            builder = builder.api_key_header(name);
        }
        for (metric, cost) in &self.metric_costs {
            builder = builder.metric_cost(metric, *cost);
        }
        if let Some(body) = &self.body {
            builder = builder.body_field_path(body);
        }
        builder.build()
    }
}

fn default_true() -> bool {
    true
}
