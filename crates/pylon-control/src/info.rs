//! Flat value objects handed to the control-plane RPC layer.
//!
//! These are the only channel between the request context and the wire
//! encoder. They carry no behavior and never borrow from the request, so a
//! filled struct stays valid after the request is gone.

use chrono::{DateTime, Utc};
use pylon_core::{ComputePlatform, Latency, Protocol};
use serde::{Deserialize, Serialize};

/// Fields common to Check and Report.
///
/// Filled by a single routine so the two calls can never disagree on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Correlates the Check and Report of one call.
    pub operation_id: String,
    /// Selector of the invoked method.
    pub operation_name: String,
    /// API key presented by the caller, empty when absent.
    pub api_key: String,
    /// Project that owns the managed service.
    pub producer_project_id: String,
    /// Project the caller's key belongs to, known only after Check.
    pub consumer_project_id: String,
    /// `referer` header of the call.
    pub referer: String,
    /// Address of the immediate caller.
    pub client_ip: String,
    /// When the gateway received the call.
    pub request_start_time: Option<DateTime<Utc>>,
}

/// W3C trace context the Check RPC should carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContextInfo {
    /// 32 hex chars.
    pub trace_id: String,
    /// 16 hex chars, the span the Check call is a child of.
    pub span_id: String,
    /// Whether the trace is sampled.
    pub sampled: bool,
}

impl TraceContextInfo {
    /// Formats the context as a `traceparent` header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{flags}", self.trace_id, self.span_id)
    }
}

/// Everything the control plane needs to decide a Check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequestInfo {
    /// Shared operation fields.
    #[serde(flatten)]
    pub operation: OperationInfo,
    /// Managed service name.
    pub service_name: String,
    /// Service configuration id.
    pub service_config_id: String,
    /// Quota metrics and the cost of this call against each.
    pub metric_costs: Vec<(String, i64)>,
    /// Trace context to propagate on the Check RPC.
    pub trace_context: Option<TraceContextInfo>,
}

/// Everything the control plane records about a finished call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequestInfo {
    /// Shared operation fields.
    #[serde(flatten)]
    pub operation: OperationInfo,
    /// Managed service name.
    pub service_name: String,
    /// Service configuration id.
    pub service_config_id: String,
    /// HTTP method of the call.
    pub http_method: String,
    /// Path as received, query string included.
    pub url: String,
    /// Wire protocol of the call.
    pub protocol: Protocol,
    /// HTTP status sent to the caller.
    pub response_code: u16,
    /// Inbound request size in bytes.
    pub request_size: u64,
    /// Response size in bytes.
    pub response_size: u64,
    /// Measured latency.
    pub latency: Latency,
    /// Best-effort location tag, empty when unknown.
    pub location: String,
    /// Platform the gateway runs on.
    pub compute_platform: ComputePlatform,
    /// One-line summary for log sinks.
    pub log_message: String,
    /// Issuer of the caller's auth token, if authentication ran.
    pub auth_issuer: String,
    /// Audience of the caller's auth token, if authentication ran.
    pub auth_audience: String,
    /// Whether the API key was valid, as recorded when Check completed.
    pub is_api_key_valid: bool,
    /// Code of the Check failure, if Check did not succeed.
    pub error_cause: Option<String>,
}
