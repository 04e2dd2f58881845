//! Fire-and-forget Report sending.

use std::fmt;
use std::sync::Arc;

use pylon_core::GatewayError;
use pylon_telemetry::metrics::record_report;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::client::ControlClient;
use crate::info::ReportRequestInfo;

/// Sends Reports on the current Tokio runtime without waiting for them.
///
/// A failed Report is logged and counted; it never reaches the original
/// caller, whose response has already been sent.
#[derive(Clone)]
pub struct ReportDispatcher {
    client: Arc<dyn ControlClient>,
}

impl ReportDispatcher {
    /// Creates a dispatcher sending through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn ControlClient>) -> Self {
        Self { client }
    }

    /// Spawns the Report. Returns `None` when no runtime is available.
    ///
    /// The handle is only useful to tests and shutdown code; dropping it
    /// does not cancel the send.
    pub fn dispatch(&self, info: ReportRequestInfo) -> Option<JoinHandle<()>> {
        let operation_id = info.operation.operation_id.clone();
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(
                operation_id = %operation_id,
                "no async runtime, report dropped"
            );
            record_report("no_runtime");
            return None;
        };

        let client = Arc::clone(&self.client);
        Some(runtime.spawn(async move {
            match client.report(info).await {
                Ok(()) => {
                    tracing::debug!(operation_id = %operation_id, "report sent");
                    record_report("sent");
                }
                Err(source) => {
                    let error = GatewayError::ReportTransport { source };
                    tracing::warn!(
                        operation_id = %operation_id,
                        error = %error,
                        "report failed"
                    );
                    record_report("failed");
                }
            }
        }))
    }
}

impl fmt::Debug for ReportDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDispatcher").finish_non_exhaustive()
    }
}
