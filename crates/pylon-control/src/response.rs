//! The control plane's answer to a Check.

use pylon_core::{CheckStatus, GatewayError};
use serde::{Deserialize, Serialize};

/// Why the control plane refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// The API key is unknown, expired or revoked.
    KeyInvalid,
    /// The caller's credentials were rejected.
    Unauthenticated,
    /// The caller may not invoke the method.
    PermissionDenied,
    /// The consumer project has not enabled the service.
    ServiceNotActivated,
    /// The consumer is out of quota.
    QuotaExhausted,
}

/// A refusal and the control plane's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    /// Refusal class.
    pub kind: DenialKind,
    /// Message returned by the control plane.
    pub message: String,
}

/// Facts learned from a Check response.
///
/// # Example
///
/// ```
/// use pylon_control::{CheckResponseInfo, DenialKind};
///
/// let allowed = CheckResponseInfo::allowed("consumer-123");
/// assert!(allowed.to_status("library.example.com").is_ok());
///
/// let denied = CheckResponseInfo::denied(DenialKind::KeyInvalid, "expired");
/// assert!(!denied.is_api_key_valid);
/// assert!(denied.to_status("library.example.com").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponseInfo {
    /// Whether the control plane accepted the API key.
    pub is_api_key_valid: bool,
    /// Whether the consumer project has the service enabled.
    pub service_is_activated: bool,
    /// Project the caller's key belongs to.
    pub consumer_project_id: String,
    /// Set when the call was refused.
    pub denial: Option<Denial>,
}

impl CheckResponseInfo {
    /// An approving response.
    #[must_use]
    pub fn allowed(consumer_project_id: impl Into<String>) -> Self {
        Self {
            is_api_key_valid: true,
            service_is_activated: true,
            consumer_project_id: consumer_project_id.into(),
            denial: None,
        }
    }

    /// A refusing response; key validity and activation follow from `kind`.
    #[must_use]
    pub fn denied(kind: DenialKind, message: impl Into<String>) -> Self {
        Self {
            is_api_key_valid: kind != DenialKind::KeyInvalid,
            service_is_activated: kind != DenialKind::ServiceNotActivated,
            consumer_project_id: String::new(),
            denial: Some(Denial {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Converts the response into the status delivered to the check continuation.
    pub fn to_status(&self, service_name: &str) -> CheckStatus {
        let Some(denial) = &self.denial else {
            return Ok(());
        };
        let message = denial.message.clone();
        Err(match denial.kind {
            DenialKind::KeyInvalid => GatewayError::KeyInvalid { message },
            DenialKind::Unauthenticated => GatewayError::Unauthenticated { message },
            DenialKind::PermissionDenied => GatewayError::PermissionDenied { message },
            DenialKind::ServiceNotActivated => GatewayError::ServiceNotActivated {
                service: service_name.to_string(),
            },
            DenialKind::QuotaExhausted => GatewayError::QuotaExhausted { message },
        })
    }
}
