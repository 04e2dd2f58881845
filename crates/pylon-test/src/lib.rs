//! # Pylon Test
//!
//! In-memory test doubles for the Pylon gateway core. Nothing here opens a
//! socket.
//!
//! - [`TestRequest`] / [`TestRequestBuilder`] - a [`Request`](pylon_core::Request)
//!   built from a method, a URI and headers
//! - [`TestResponse`] - a [`Response`](pylon_core::Response) with fixed sizes and latency
//! - [`MockControlClient`] - a scripted [`ControlClient`](pylon_control::ControlClient)
//!   that records every Check and Report it receives
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pylon_control::{CheckResponseInfo, ControlClient, DenialKind};
//! use pylon_core::Request;
//! use pylon_test::{MockControlClient, TestRequest};
//!
//! let request = TestRequest::get("/v1/items?key=abc123")
//!     .header("X-Foo", "a")
//!     .header("X-Foo", "b")
//!     .build()
//!     .unwrap();
//! assert_eq!(request.find_query("key").as_deref(), Some("abc123"));
//! assert_eq!(request.find_header("x-foo").as_deref(), Some("a"));
//!
//! let mock = Arc::new(
//!     MockControlClient::new()
//!         .with_check_response(CheckResponseInfo::denied(DenialKind::KeyInvalid, "revoked")),
//! );
//! let client: Arc<dyn ControlClient> = mock.clone();
//! # let _ = client;
//! ```

#![doc(html_root_url = "https://docs.rs/pylon-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::MockControlClient;
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
