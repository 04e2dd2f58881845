//! Process-wide policy knobs, set once from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Starting value of a request's `is_api_key_valid` flag.
///
/// The flag feeds billing and quota records in the Report, so the choice
/// is explicit rather than implied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValidityPolicy {
    /// Start valid; only a confirmed rejection (or a missing key) clears it.
    #[default]
    Optimistic,
    /// Start invalid; only a successful Check with a non-empty key sets it.
    Pessimistic,
}

impl KeyValidityPolicy {
    /// Value the flag holds before Check completes.
    #[must_use]
    pub const fn initial_validity(self) -> bool {
        matches!(self, Self::Optimistic)
    }
}

/// What to do when the Check RPC cannot get an answer from the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFailurePolicy {
    /// Deny methods that need a key, quota or auth; let the rest through.
    #[default]
    FailClosed,
    /// Let every call through.
    FailOpen,
}

/// How exactly-once and at-most-once violations are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMode {
    /// Panic at the violating call site.
    Panic,
    /// Log an error, count it, and ignore the call.
    Log,
}

impl Default for ContractMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Log
        }
    }
}

/// Compute platform the gateway runs on, recorded in every Report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputePlatform {
    /// Not known.
    #[default]
    Unknown,
    /// A plain virtual machine.
    Vm,
    /// A managed Kubernetes cluster.
    Kubernetes,
    /// A serverless container platform.
    Serverless,
    /// A platform-as-a-service runtime.
    AppRuntime,
}

impl ComputePlatform {
    /// Returns the label written to the Report.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Vm => "VM",
            Self::Kubernetes => "KUBERNETES",
            Self::Serverless => "SERVERLESS",
            Self::AppRuntime => "APP_RUNTIME",
        }
    }
}

impl fmt::Display for ComputePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
