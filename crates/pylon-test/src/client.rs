//! A scripted control-plane client.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use pylon_control::{
    BoxFuture, CheckRequestInfo, CheckResponseInfo, ControlClient, ReportRequestInfo,
    TransportError,
};
use tokio::sync::Notify;

/// A [`ControlClient`] that answers from a script and records every call.
///
/// Check answers are taken from the script in order; once it runs out the
/// default answer (allow, consumer `""`) is used. Calls are recorded when
/// they are made, before any configured delay.
///
/// Share it as `Arc<MockControlClient>` and coerce a clone to
/// `Arc<dyn ControlClient>` to keep a handle for assertions.
#[derive(Debug)]
pub struct MockControlClient {
    script: Mutex<VecDeque<Result<CheckResponseInfo, TransportError>>>,
    default_check: Result<CheckResponseInfo, TransportError>,
    check_delay: Option<Duration>,
    report_result: Result<(), TransportError>,
    checks: Mutex<Vec<CheckRequestInfo>>,
    reports: Mutex<Vec<ReportRequestInfo>>,
    report_notify: Notify,
}

impl Default for MockControlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockControlClient {
    /// A client that allows every call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_check: Ok(CheckResponseInfo::allowed("")),
            check_delay: None,
            report_result: Ok(()),
            checks: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            report_notify: Notify::new(),
        }
    }

    /// Queues the answer to the next unanswered Check.
    #[must_use]
    pub fn with_check_response(self, response: CheckResponseInfo) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Queues a transport failure for the next unanswered Check.
    #[must_use]
    pub fn with_check_failure(self, error: TransportError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Sets the answer used once the script is exhausted.
    #[must_use]
    pub fn with_default_check(mut self, result: Result<CheckResponseInfo, TransportError>) -> Self {
        self.default_check = result;
        self
    }

    /// Delays every Check answer.
    #[must_use]
    pub fn with_check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = Some(delay);
        self
    }

    /// Makes every Report fail with `error`.
    #[must_use]
    pub fn with_report_failure(mut self, error: TransportError) -> Self {
        self.report_result = Err(error);
        self
    }

    /// Queues an answer after construction.
    pub fn push_check_response(&self, response: CheckResponseInfo) {
        self.script.lock().push_back(Ok(response));
    }

    /// Every Check received so far.
    #[must_use]
    pub fn check_calls(&self) -> Vec<CheckRequestInfo> {
        self.checks.lock().clone()
    }

    /// Every Report received so far.
    #[must_use]
    pub fn report_calls(&self) -> Vec<ReportRequestInfo> {
        self.reports.lock().clone()
    }

    /// Number of Checks received.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.lock().len()
    }

    /// Number of Reports received.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.reports.lock().len()
    }

    /// Waits until at least `count` Reports have arrived.
    ///
    /// Reports are sent from spawned tasks; wrap this in a timeout when a
    /// Report might never come.
    pub async fn wait_for_reports(&self, count: usize) {
        loop {
            let notified = self.report_notify.notified();
            if self.report_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl ControlClient for MockControlClient {
    fn check(
        &self,
        info: CheckRequestInfo,
    ) -> BoxFuture<'static, Result<CheckResponseInfo, TransportError>> {
        self.checks.lock().push(info);
        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_check.clone());
        let delay = self.check_delay;

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }

    fn report(&self, info: ReportRequestInfo) -> BoxFuture<'static, Result<(), TransportError>> {
        self.reports.lock().push(info);
        self.report_notify.notify_waiters();
        let result = self.report_result.clone();
        Box::pin(async move { result })
    }
}
