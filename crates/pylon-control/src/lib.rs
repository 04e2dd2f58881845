//! # Pylon Control
//!
//! The boundary between the gateway core and the control plane:
//!
//! - [`CheckRequestInfo`] / [`ReportRequestInfo`] - what the core sends
//! - [`CheckResponseInfo`] - what a Check answers
//! - [`ControlClient`] - the trait a wire client implements
//! - [`ReportDispatcher`] - fire-and-forget Report sending
//!
//! Wire encoding and connection management live behind [`ControlClient`].

#![doc(html_root_url = "https://docs.rs/pylon-control/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod dispatcher;
mod info;
mod response;

pub use client::{BoxFuture, ControlClient};
pub use dispatcher::ReportDispatcher;
pub use info::{CheckRequestInfo, OperationInfo, ReportRequestInfo, TraceContextInfo};
pub use response::{CheckResponseInfo, Denial, DenialKind};

/// Re-exported so client implementations need only this crate.
pub use pylon_core::TransportError;
