//! # Pylon Core
//!
//! Core types shared by every Pylon crate:
//!
//! - [`Request`] - capability trait the transport implements for one inbound call
//! - [`Response`] - capability trait describing the finished backend response
//! - [`AuthState`] / [`UserInfo`] - the facts an authentication step writes back
//! - [`MethodInfo`] / [`MethodCallInfo`] - resolved API method descriptors
//! - [`GatewayError`] - the gateway error taxonomy and [`CheckStatus`]
//! - Process-wide policy knobs ([`KeyValidityPolicy`], [`CheckFailurePolicy`],
//!   [`ContractMode`], [`ComputePlatform`])

#![doc(html_root_url = "https://docs.rs/pylon-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod error;
mod method;
mod policy;
mod protocol;
mod request;
mod response;

pub use auth::{AuthState, UserInfo};
pub use error::{
    CheckStatus, ErrorCategory, ErrorEnvelope, GatewayError, GatewayResult, TransportError,
};
pub use method::{MethodCallInfo, MethodInfo, MethodInfoBuilder};
pub use policy::{CheckFailurePolicy, ComputePlatform, ContractMode, KeyValidityPolicy};
pub use protocol::Protocol;
pub use request::Request;
pub use response::{Latency, Response};

/// Re-exported so descriptor users need not depend on the router directly.
pub use pylon_router::Bindings;
