//! Path-template routing table for the Pylon gateway.
//!
//! The gateway resolves every inbound call (HTTP method + path) to the
//! descriptor of the logical API method it invokes. This crate provides that
//! lookup as a generic [`Router<T>`] so the descriptor type stays owned by the
//! caller (Pylon stores `Arc<MethodInfo>` values).
//!
//! # Templates
//!
//! - Literal segments: `/v1/items`
//! - Named variables: `/v1/items/{id}`
//! - Trailing catch-all: `/v1/files/*path` or `/v1/files/{path=**}`
//!
//! Static segments win over variables, variables win over catch-alls.
//!
//! # Example
//!
//! ```rust
//! use pylon_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(&Method::GET, "/v1/items", "items.list").unwrap();
//! router.insert(&Method::GET, "/v1/items/{id}", "items.get").unwrap();
//!
//! let found = router.lookup(&Method::GET, "/v1/items/42?alt=json").unwrap();
//! assert_eq!(*found.value, "items.get");
//! assert_eq!(found.bindings.get("id"), Some("42"));
//! ```

#![doc(html_root_url = "https://docs.rs/pylon-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bindings;
mod error;
mod method_table;
mod node;
mod router;

pub use bindings::Bindings;
pub use error::RouterError;
pub use method_table::MethodTable;
pub use router::Router;

/// A matched route: the registered value plus the variables bound by the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The value registered for the template and method.
    pub value: &'a T,
    /// Variables captured from the path.
    pub bindings: Bindings,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(value: &'a T, bindings: Bindings) -> Self {
        Self { value, bindings }
    }
}
