//! Test response double.

use std::time::Duration;

use pylon_core::{Latency, Response};

/// An in-memory [`Response`] with fixed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestResponse {
    status: u16,
    request_size: u64,
    response_size: u64,
    latency: Latency,
}

impl TestResponse {
    /// A response with `status`, empty bodies and zero latency.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            request_size: 0,
            response_size: 0,
            latency: Latency::default(),
        }
    }

    /// A `200 OK` response.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Sets the request and response sizes in bytes.
    #[must_use]
    pub fn with_sizes(mut self, request_size: u64, response_size: u64) -> Self {
        self.request_size = request_size;
        self.response_size = response_size;
        self
    }

    /// Sets the total and backend time; the rest counts as overhead.
    #[must_use]
    pub fn with_latency(mut self, request_time: Duration, backend_time: Duration) -> Self {
        self.latency = Latency::from_request_and_backend(request_time, backend_time);
        self
    }
}

impl Response for TestResponse {
    fn status_code(&self) -> u16 {
        self.status
    }

    fn request_size(&self) -> u64 {
        self.request_size
    }

    fn response_size(&self) -> u64 {
        self.response_size
    }

    fn latency(&self) -> Latency {
        self.latency
    }
}
