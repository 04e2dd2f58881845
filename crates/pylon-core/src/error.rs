//! Error types for the Pylon gateway.
//!
//! [`GatewayError`] covers every way a call can fail between routing and the
//! Report, grouped by [`ErrorCategory`]:
//!
//! | Category | Variants | HTTP |
//! |---|---|---|
//! | `Routing` | `Routing` | 404 |
//! | `InvalidRequest` | `MalformedRequest` | 400 |
//! | `Authentication` | `KeyMissing`, `KeyInvalid`, `Unauthenticated` | 401 |
//! | `Authorization` | `PermissionDenied`, `ServiceNotActivated` | 403 |
//! | `Quota` | `QuotaExhausted` | 429 |
//! | `Unavailable` | `CheckTransport`, `ReportTransport` | 503 |
//! | `Timeout` | `Timeout` | 504 |
//! | `Internal` | `Cancelled`, `InvalidState`, `Internal` | 500 |
//!
//! Check-path failures reach the transport through the check continuation
//! as a [`CheckStatus`].

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Outcome of the Check step, delivered once through the check continuation.
pub type CheckStatus = Result<(), GatewayError>;

/// Coarse error classes used for status mapping and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No API method matches the call.
    Routing,
    /// The request could not be interpreted.
    InvalidRequest,
    /// Missing or rejected credentials.
    Authentication,
    /// Credentials accepted but the call is not allowed.
    Authorization,
    /// Quota exhausted.
    Quota,
    /// The control plane could not be reached.
    Unavailable,
    /// The control plane did not answer in time.
    Timeout,
    /// A bug or contract violation inside the gateway.
    Internal,
}

impl ErrorCategory {
    /// Returns the HTTP status the transport should answer with.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Routing => StatusCode::NOT_FOUND,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Quota => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the snake_case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Quota => "quota",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

/// Failure of an RPC to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The control plane could not be reached.
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The control plane answered with a non-success RPC status.
    #[error("control plane returned status {status}: {message}")]
    Status {
        /// Numeric RPC or HTTP status.
        status: u16,
        /// Message returned by the control plane.
        message: String,
    },

    /// The request could not be encoded for the wire.
    #[error("failed to encode control plane request: {0}")]
    Encode(String),
}

/// Standard error type for the gateway.
///
/// # Example
///
/// ```
/// use pylon_core::{ErrorCategory, GatewayError};
///
/// let err = GatewayError::key_missing("items.get");
/// assert_eq!(err.category(), ErrorCategory::Authentication);
/// assert!(err.is_denial());
/// assert_eq!(err.code(), "API_KEY_MISSING");
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No API method is registered for the method and path.
    #[error("no API method matches {http_method} {path}")]
    Routing {
        /// HTTP method of the call.
        http_method: String,
        /// Request path of the call.
        path: String,
    },

    /// The request is malformed and cannot be processed.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Human-readable error message.
        message: String,
    },

    /// The method requires an API key and none was supplied.
    #[error("method {selector} requires an API key but none was supplied")]
    KeyMissing {
        /// Selector of the method that required the key.
        selector: String,
    },

    /// The control plane rejected the supplied API key.
    #[error("API key rejected: {message}")]
    KeyInvalid {
        /// Human-readable error message.
        message: String,
    },

    /// Authentication failed for a reason other than the API key.
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is not allowed to invoke the method.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Human-readable error message.
        message: String,
    },

    /// The consumer project has not enabled the service.
    #[error("service {service} is not activated for the consumer project")]
    ServiceNotActivated {
        /// Name of the managed service.
        service: String,
    },

    /// The consumer ran out of quota.
    #[error("quota exhausted: {message}")]
    QuotaExhausted {
        /// Human-readable error message.
        message: String,
    },

    /// The Check RPC itself failed.
    #[error("service control check failed: {source}")]
    CheckTransport {
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// The Check RPC did not complete within the deadline.
    #[error("service control check timed out after {elapsed:?}")]
    Timeout {
        /// How long the gateway waited.
        elapsed: Duration,
    },

    /// The Check was abandoned before the control plane answered.
    #[error("check abandoned before completion: {reason}")]
    Cancelled {
        /// Why the check was abandoned.
        reason: String,
    },

    /// The Report RPC failed. Never surfaced to the original caller.
    #[error("service control report failed: {source}")]
    ReportTransport {
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// A request context operation was invoked out of order.
    #[error("invalid request state transition from {from} to {to}")]
    InvalidState {
        /// State the context was in.
        from: &'static str,
        /// State the caller tried to reach.
        to: &'static str,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatewayError {
    /// Creates a routing error.
    #[must_use]
    pub fn routing(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Routing {
            http_method: http_method.into(),
            path: path.into(),
        }
    }

    /// Creates a malformed request error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates a missing API key error.
    #[must_use]
    pub fn key_missing(selector: impl Into<String>) -> Self {
        Self::KeyMissing {
            selector: selector.into(),
        }
    }

    /// Creates an invalid API key error.
    #[must_use]
    pub fn key_invalid(message: impl Into<String>) -> Self {
        Self::KeyInvalid {
            message: message.into(),
        }
    }

    /// Creates a permission denied error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Creates a quota exhausted error.
    #[must_use]
    pub fn quota_exhausted(message: impl Into<String>) -> Self {
        Self::QuotaExhausted {
            message: message.into(),
        }
    }

    /// Creates a cancelled-check error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Routing { .. } => ErrorCategory::Routing,
            Self::MalformedRequest { .. } => ErrorCategory::InvalidRequest,
            Self::KeyMissing { .. } | Self::KeyInvalid { .. } | Self::Unauthenticated { .. } => {
                ErrorCategory::Authentication
            }
            Self::PermissionDenied { .. } | Self::ServiceNotActivated { .. } => {
                ErrorCategory::Authorization
            }
            Self::QuotaExhausted { .. } => ErrorCategory::Quota,
            Self::CheckTransport { .. } | Self::ReportTransport { .. } => ErrorCategory::Unavailable,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } | Self::InvalidState { .. } | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns a stable machine-readable code, recorded as the Report's error cause.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Routing { .. } => "ROUTING_FAILURE",
            Self::MalformedRequest { .. } => "MALFORMED_REQUEST",
            Self::KeyMissing { .. } => "API_KEY_MISSING",
            Self::KeyInvalid { .. } => "API_KEY_INVALID",
            Self::Unauthenticated { .. } => "UNAUTHENTICATED",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::ServiceNotActivated { .. } => "SERVICE_NOT_ACTIVATED",
            Self::QuotaExhausted { .. } => "QUOTA_EXHAUSTED",
            Self::CheckTransport { .. } => "CHECK_TRANSPORT_FAILURE",
            Self::Timeout { .. } => "CHECK_TIMEOUT",
            Self::Cancelled { .. } => "CHECK_CANCELLED",
            Self::ReportTransport { .. } => "REPORT_TRANSPORT_FAILURE",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// True when the control plane (or a local pre-check) refused the call.
    #[must_use]
    pub const fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::KeyMissing { .. }
                | Self::KeyInvalid { .. }
                | Self::Unauthenticated { .. }
                | Self::PermissionDenied { .. }
                | Self::ServiceNotActivated { .. }
                | Self::QuotaExhausted { .. }
        )
    }

    /// True when the control plane could not give an answer at all.
    #[must_use]
    pub const fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::CheckTransport { .. } | Self::Timeout { .. })
    }

    /// True when this outcome establishes that the caller's API key is not valid.
    #[must_use]
    pub const fn invalidates_api_key(&self) -> bool {
        matches!(self, Self::KeyMissing { .. } | Self::KeyInvalid { .. })
    }

    /// The status a still-pending Check receives when the call is abandoned
    /// with this error.
    ///
    /// Timeouts and transport failures keep their kind so callers can still
    /// tell an unreachable control plane from a denial.
    #[must_use]
    pub fn for_pending_check(&self) -> Self {
        match self {
            Self::Timeout { elapsed } => Self::Timeout { elapsed: *elapsed },
            Self::CheckTransport { source } => Self::CheckTransport {
                source: source.clone(),
            },
            other => Self::cancelled(other.to_string()),
        }
    }

    /// Converts this error to a serializable envelope for the transport.
    #[must_use]
    pub fn to_envelope(&self, operation_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            category: self.category(),
            status: self.status_code().as_u16(),
            operation_id: operation_id.map(ToString::to_string),
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(source: TransportError) -> Self {
        Self::CheckTransport { source }
    }
}

/// Serializable error body a transport can send back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// HTTP status code.
    pub status: u16,
    /// Operation id of the failed call, for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_errors_are_authentication_denials() {
        for err in [GatewayError::key_missing("items.get"), GatewayError::key_invalid("expired")] {
            assert_eq!(err.category(), ErrorCategory::Authentication);
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(err.is_denial());
            assert!(err.invalidates_api_key());
            assert!(!err.is_backend_unavailable());
        }
    }

    #[test]
    fn test_transport_failure_is_distinct_from_denial() {
        let err: GatewayError = TransportError::Unavailable("connection refused".to_string()).into();
        assert!(err.is_backend_unavailable());
        assert!(!err.is_denial());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = GatewayError::Timeout {
            elapsed: Duration::from_millis(250),
        };
        assert!(err.is_backend_unavailable());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), "CHECK_TIMEOUT");
    }

    #[test]
    fn test_pending_check_status_keeps_unavailable_kinds() {
        let timeout = GatewayError::Timeout {
            elapsed: Duration::from_millis(100),
        };
        assert_eq!(timeout.for_pending_check().code(), "CHECK_TIMEOUT");

        let transport: GatewayError = TransportError::Unavailable("reset".to_string()).into();
        let pending = transport.for_pending_check();
        assert!(pending.is_backend_unavailable());
        assert_eq!(pending.code(), "CHECK_TRANSPORT_FAILURE");

        let cancelled = GatewayError::malformed("bad body").for_pending_check();
        assert_eq!(cancelled.code(), "CHECK_CANCELLED");
        assert!(cancelled.to_string().contains("bad body"));
    }

    #[test]
    fn test_routing_error_message() {
        let err = GatewayError::routing("GET", "/v1/nothing");
        assert_eq!(err.to_string(), "no API method matches GET /v1/nothing");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_with_source_keeps_chain() {
        let err = GatewayError::internal_with_source("boom", std::io::Error::other("disk"));
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert!(source.to_string().contains("disk"));
    }

    #[test]
    fn test_envelope_serialization() {
        let err = GatewayError::quota_exhausted("read requests per minute");
        let envelope = err.to_envelope(Some("op-1"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"QUOTA_EXHAUSTED\""));
        assert!(json.contains("\"category\":\"quota\""));
        assert!(json.contains("\"status\":429"));
        assert!(json.contains("\"operation_id\":\"op-1\""));
    }

    #[test]
    fn test_all_categories_map_to_error_statuses() {
        let categories = [
            ErrorCategory::Routing,
            ErrorCategory::InvalidRequest,
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::Quota,
            ErrorCategory::Unavailable,
            ErrorCategory::Timeout,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "{category:?} should map to an error status, got {status}"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_envelope_mirrors_error(message in ".{0,40}", op in "[a-f0-9]{8}") {
            for err in [
                GatewayError::malformed(message.clone()),
                GatewayError::permission_denied(message.clone()),
                GatewayError::cancelled(message.clone()),
                GatewayError::internal(message.clone()),
            ] {
                let envelope = err.to_envelope(Some(&op));
                prop_assert_eq!(envelope.code.as_str(), err.code());
                prop_assert_eq!(envelope.status, err.status_code().as_u16());
                prop_assert_eq!(envelope.operation_id.as_deref(), Some(op.as_str()));
                prop_assert!(!err.is_backend_unavailable());
            }
        }
    }
}
