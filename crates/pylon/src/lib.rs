//! # Pylon
//!
//! The request-mediation core of an API gateway. For every inbound call
//! Pylon resolves the API method, extracts the caller's API key, asks the
//! control plane whether the call may proceed (Check), and after the
//! backend responds records what happened (Report).
//!
//! ## Crates
//!
//! - [`core`] - error taxonomy, method descriptors, the `Request`/`Response` traits
//! - [`router`] - path template matching
//! - [`control`] - Check/Report payloads and the control-plane client seam
//! - [`context`] - `ServiceContext` and the per-call `RequestContext`
//! - [`config`] - layered gateway configuration
//! - [`telemetry`] - logging, tracing and metrics setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use pylon::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new()
//!         .with_file("pylon.toml")?
//!         .with_env_prefix("PYLON")
//!         .load()?;
//!     let _telemetry = pylon::telemetry::init_telemetry(config.telemetry_config())?;
//!
//!     let gateway = Gateway::from_config(&config, Arc::new(MyControlClient::connect().await?))?;
//!
//!     // per call:
//!     let mut ctx = gateway.start(Box::new(request))?;
//!     gateway.check(&mut ctx).await?;
//!     // ... forward to the backend ...
//!     gateway.report(&mut ctx, &response)?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/pylon/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod gateway;

pub use gateway::Gateway;

// Re-export crates
pub use pylon_config as config;
pub use pylon_context as context;
pub use pylon_control as control;
pub use pylon_core as core;
pub use pylon_router as router;
pub use pylon_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use pylon::prelude::*;
/// ```
pub mod prelude {
    pub use crate::Gateway;

    pub use pylon_config::{ConfigLoader, GatewayConfig};
    pub use pylon_context::{
        BuildError, LocationResolver, OperationId, RequestContext, RequestState, ServiceContext,
        ServiceContextBuilder,
    };
    pub use pylon_control::{
        CheckRequestInfo, CheckResponseInfo, ControlClient, ReportDispatcher, ReportRequestInfo,
    };
    pub use pylon_core::{
        AuthState, CheckFailurePolicy, CheckStatus, ComputePlatform, ContractMode, GatewayError,
        GatewayResult, KeyValidityPolicy, MethodInfo, Protocol, Request, Response, TransportError,
        UserInfo,
    };
}
