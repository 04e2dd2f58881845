//! The finished-response capability read by the Report step.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time spent on one call, split between the backend and the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    /// Wall time from receiving the request to sending the response.
    pub request_time: Duration,
    /// Time spent waiting on the backend.
    pub backend_time: Duration,
    /// Time spent in the gateway itself.
    pub overhead_time: Duration,
}

impl Latency {
    /// Builds a latency where everything not spent in the backend is overhead.
    #[must_use]
    pub fn from_request_and_backend(request_time: Duration, backend_time: Duration) -> Self {
        Self {
            request_time,
            backend_time,
            overhead_time: request_time.saturating_sub(backend_time),
        }
    }
}

/// What the Report needs to know about the response the caller received.
pub trait Response: Send + Sync {
    /// HTTP status code sent to the caller.
    fn status_code(&self) -> u16;

    /// Size of the inbound request in bytes.
    fn request_size(&self) -> u64;

    /// Size of the response in bytes.
    fn response_size(&self) -> u64;

    /// Measured latency.
    fn latency(&self) -> Latency;
}
