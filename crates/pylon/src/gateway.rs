//! The Check/Report workflow for one call.

use std::sync::Arc;
use std::time::Instant;

use pylon_config::GatewayConfig;
use pylon_context::{BuildError, RequestContext, RequestState, ServiceContext};
use pylon_control::{CheckRequestInfo, ControlClient, ReportRequestInfo};
use pylon_core::{CheckStatus, GatewayError, GatewayResult, Request, Response};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Drives a call through Check and Report.
///
/// The transport calls [`Gateway::start`] when a request arrives,
/// [`Gateway::check`] before forwarding it to the backend, and
/// [`Gateway::report`] once the response has been sent.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use pylon::prelude::*;
/// use pylon_test::{MockControlClient, TestRequest, TestResponse};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = ServiceContext::builder("library.example.com", Arc::new(MockControlClient::new()))
///     .route("GET", "/v1/items", MethodInfo::builder("items.get").build())
///     .build()
///     .unwrap();
/// let gateway = Gateway::new(Arc::new(service));
///
/// let request = TestRequest::get("/v1/items?key=K1").build().unwrap();
/// let mut ctx = gateway.start(request.boxed()).unwrap();
/// assert!(gateway.check(&mut ctx).await.is_ok());
///
/// // ... forward to the backend ...
///
/// gateway.report(&mut ctx, &TestResponse::ok()).unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    service: Arc<ServiceContext>,
}

impl Gateway {
    /// Creates a gateway for a built service context.
    #[must_use]
    pub fn new(service: Arc<ServiceContext>) -> Self {
        Self { service }
    }

    /// Builds the service context from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the configuration is invalid.
    pub fn from_config(
        config: &GatewayConfig,
        control_client: Arc<dyn ControlClient>,
    ) -> Result<Self, BuildError> {
        let service = ServiceContext::from_config(config, control_client)?;
        Ok(Self::new(Arc::new(service)))
    }

    /// The shared service context.
    #[must_use]
    pub fn service(&self) -> &Arc<ServiceContext> {
        &self.service
    }

    /// Resolves the call and builds its context.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Routing`] when no method matches; the call
    /// gets neither Check nor Report.
    pub fn start(&self, request: Box<dyn Request>) -> GatewayResult<RequestContext> {
        RequestContext::new(Arc::clone(&self.service), request)
    }

    /// Runs Check for the call.
    ///
    /// Extracts the API key, short-circuits locally where possible (skipped
    /// methods pass, a missing required key fails), and otherwise asks the
    /// control plane within the service's check timeout. The returned status
    /// is the one the context's continuation received.
    ///
    /// # Errors
    ///
    /// Returns the denial, the unwaived transport failure or timeout, or
    /// [`GatewayError::InvalidState`] if Check already ran for this context.
    pub async fn check(&self, ctx: &mut RequestContext) -> CheckStatus {
        ctx.extract_api_key()?;
        let outcome = ctx.check_receiver()?;
        let method = Arc::clone(&ctx.method_call_info().method_info);

        if method.skip_service_control() {
            ctx.complete_check(Ok(()))?;
        } else if method.requires_api_key() && ctx.api_key().is_empty() {
            ctx.complete_check(Err(GatewayError::key_missing(method.selector())))?;
        } else {
            let mut info = CheckRequestInfo::default();
            ctx.fill_check_request_info(&mut info);
            ctx.mark_check_dispatched()?;
            let status = self.call_check(ctx, info).await;
            ctx.complete_check(status)?;
        }

        outcome
            .await
            .unwrap_or_else(|_| Err(GatewayError::cancelled("check continuation dropped")))
    }

    async fn call_check(&self, ctx: &mut RequestContext, info: CheckRequestInfo) -> CheckStatus {
        let deadline = self.service.check_timeout();
        let started = Instant::now();
        let call = self.service.control_client().check(info);

        match tokio::time::timeout(deadline, call)
            .instrument(ctx.span().clone())
            .await
        {
            Ok(Ok(response)) => {
                ctx.record_check_response(&response)?;
                response.to_status(self.service.service_name())
            }
            Ok(Err(source)) => Err(GatewayError::CheckTransport { source }),
            Err(_) => Err(GatewayError::Timeout {
                elapsed: started.elapsed(),
            }),
        }
    }

    /// Fills and sends the Report, then finishes the context.
    ///
    /// Aborted calls and methods that skip service control are not
    /// reported. The send happens in the background; the handle is `None`
    /// when nothing was sent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] if Check has not completed.
    pub fn report(
        &self,
        ctx: &mut RequestContext,
        response: &dyn Response,
    ) -> GatewayResult<Option<JoinHandle<()>>> {
        if ctx.state() == RequestState::Failed {
            return Ok(None);
        }

        let skipped = ctx.method_call_info().method_info.skip_service_control();
        if skipped || !self.service.report_enabled() {
            ctx.finish()?;
            return Ok(None);
        }

        let mut info = ReportRequestInfo::default();
        ctx.fill_report_request_info(response, &mut info)?;
        let handle = self.service.report_dispatcher().dispatch(info);
        ctx.finish()?;
        Ok(handle)
    }
}
