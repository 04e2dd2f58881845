//! # Pylon Context
//!
//! The state that mediates one call between the caller and the control plane.
//!
//! - [`ServiceContext`] - shared, read-only facts about the managed service,
//!   including the routing table and the control-plane client
//! - [`RequestContext`] - per-call orchestrator for Check and Report
//! - [`RequestTrace`] - the per-call span tree and W3C trace context
//! - [`OperationId`] - correlates a call's Check and Report
//!
//! ## Lifecycle
//!
//! ```text
//! Created -> KeyExtracted -> CheckDispatched -> CheckCompleted -> ReportFilled -> Done
//!    \______________\_______________\_________________\_______________\-> Failed
//! ```
//!
//! The Check outcome reaches the caller exactly once, either through a
//! registered continuation or the receiver from
//! [`RequestContext::check_receiver`].

#![doc(html_root_url = "https://docs.rs/pylon-context/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod location;
mod operation_id;
mod service;
mod state;
mod trace;

pub use context::{CheckContinuation, RequestContext};
pub use error::BuildError;
pub use location::LocationResolver;
pub use operation_id::OperationId;
pub use service::{ServiceContext, ServiceContextBuilder};
pub use state::RequestState;
pub use trace::{RequestTrace, TraceFlags, TraceParent, TRACEPARENT_HEADER};
