//! The per-request orchestrator.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pylon_control::{CheckRequestInfo, CheckResponseInfo, OperationInfo, ReportRequestInfo};
use pylon_core::{
    CheckFailurePolicy, CheckStatus, ContractMode, GatewayError, GatewayResult, MethodCallInfo,
    Protocol, Request, Response, UserInfo,
};
use pylon_telemetry::metrics::{record_check, record_contract_violation, record_routing_failure};
use pylon_telemetry::InFlightGuard;
use tokio::sync::oneshot;
use tracing::Span;

use crate::operation_id::OperationId;
use crate::service::ServiceContext;
use crate::state::RequestState;
use crate::trace::{RequestTrace, TRACEPARENT_HEADER};

/// Receives the Check outcome. Fired exactly once.
pub type CheckContinuation = Box<dyn FnOnce(CheckStatus) + Send + 'static>;

/// Request facts copied at construction so Report filling never needs the
/// request itself.
#[derive(Debug, Clone)]
struct RequestSnapshot {
    http_method: String,
    path: String,
    unparsed_path: String,
    client_ip: String,
    protocol: Protocol,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl RequestSnapshot {
    fn capture(request: &dyn Request) -> Self {
        Self {
            http_method: request.http_method().to_string(),
            path: request.path().to_string(),
            unparsed_path: request.unparsed_path().to_string(),
            client_ip: request.client_ip().to_string(),
            protocol: request.protocol(),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }
}

/// Everything the gateway knows about one in-flight call.
///
/// Built once routing has resolved the call. It then drives Check
/// (extract the API key, fill [`CheckRequestInfo`], complete with the
/// outcome) and Report (fill [`ReportRequestInfo`]). See [`RequestState`]
/// for the order these steps must run in.
///
/// Calling a step twice or out of order is a contract violation. Under
/// [`ContractMode::Panic`] it panics; under [`ContractMode::Log`] it is
/// logged, counted, and returned as [`GatewayError::InvalidState`] without
/// touching the context.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use pylon_context::{RequestContext, ServiceContext};
/// use pylon_control::CheckRequestInfo;
/// use pylon_core::MethodInfo;
/// use pylon_test::{MockControlClient, TestRequest};
///
/// let service = Arc::new(
///     ServiceContext::builder("library.example.com", Arc::new(MockControlClient::new()))
///         .route("GET", "/v1/items", MethodInfo::builder("items.get").build())
///         .build()
///         .unwrap(),
/// );
///
/// let request = TestRequest::get("/v1/items?api_key=K1").build().unwrap();
/// let mut ctx = RequestContext::new(service, request.boxed()).unwrap();
/// ctx.extract_api_key().unwrap();
///
/// let mut info = CheckRequestInfo::default();
/// ctx.fill_check_request_info(&mut info);
/// assert_eq!(info.operation.api_key, "K1");
/// assert_eq!(info.operation.operation_name, "items.get");
/// ```
pub struct RequestContext {
    service: Arc<ServiceContext>,
    request: Option<Box<dyn Request>>,
    snapshot: RequestSnapshot,
    method: MethodCallInfo,
    operation_id: OperationId,
    state: RequestState,

    api_key: String,
    is_api_key_valid: bool,
    auth_issuer: String,
    auth_audience: String,
    http_referer: Option<String>,
    consumer_project_id: String,
    error_cause: Option<&'static str>,
    check_waived: bool,

    continuation: Option<CheckContinuation>,
    continuation_fired: bool,
    check_dispatched_at: Option<Instant>,

    trace: RequestTrace,
    _in_flight: InFlightGuard,
}

impl RequestContext {
    /// Resolves the call's method and builds its context.
    ///
    /// Only identity is populated: the operation id, the resolved method,
    /// the key-validity default and the root span.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Routing`] when no configured method matches.
    /// The call must then be rejected without Check or Report.
    pub fn new(service: Arc<ServiceContext>, request: Box<dyn Request>) -> GatewayResult<Self> {
        let method = match service.resolve(request.http_method(), request.path()) {
            Ok(method) => method,
            Err(error) => {
                record_routing_failure();
                tracing::warn!(
                    http.method = %request.http_method(),
                    http.path = %request.path(),
                    "no API method matches the call"
                );
                return Err(error);
            }
        };

        let operation_id = OperationId::new();
        let trace = RequestTrace::new(
            &operation_id.to_string(),
            method.selector(),
            request.http_method(),
            request.path(),
            request.find_header(TRACEPARENT_HEADER).as_deref(),
        );
        trace.record_state(RequestState::Created.as_str());

        tracing::debug!(
            parent: trace.span(),
            operation_id = %operation_id,
            selector = %method.selector(),
            "request context created"
        );

        Ok(Self {
            is_api_key_valid: service.key_validity().initial_validity(),
            snapshot: RequestSnapshot::capture(&*request),
            request: Some(request),
            service,
            method,
            operation_id,
            state: RequestState::Created,
            api_key: String::new(),
            auth_issuer: String::new(),
            auth_audience: String::new(),
            http_referer: None,
            consumer_project_id: String::new(),
            error_cause: None,
            check_waived: false,
            continuation: None,
            continuation_fired: false,
            check_dispatched_at: None,
            trace,
            _in_flight: InFlightGuard::new(),
        })
    }

    /// Looks up the caller's API key.
    ///
    /// Query parameters are searched first, then headers, each in configured
    /// order; the first non-empty value wins. The method's own lists replace
    /// the service defaults. A missing key is not an error here: Check
    /// reports it for methods that need one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] if the key was already
    /// extracted or the request has been released.
    pub fn extract_api_key(&mut self) -> GatewayResult<()> {
        if self.state != RequestState::Created {
            return Err(self.violation("api_key_reextracted", RequestState::KeyExtracted));
        }
        let Some(request) = self.request.as_deref() else {
            return Err(self.violation("request_released", RequestState::KeyExtracted));
        };

        let info = &self.method.method_info;
        let query_params = info
            .api_key_query_params()
            .unwrap_or(self.service.api_key_query_params());
        let headers = info
            .api_key_headers()
            .unwrap_or(self.service.api_key_headers());

        let key = self
            .trace
            .in_extract_span(|| find_api_key(request, query_params, headers));

        tracing::debug!(
            parent: self.trace.span(),
            operation_id = %self.operation_id,
            api_key_present = key.is_some(),
            "api key extracted"
        );

        self.api_key = key.unwrap_or_default();
        self.advance(RequestState::KeyExtracted);
        Ok(())
    }

    /// Fills the fields of a Check request.
    ///
    /// Pure copy; it can be repeated and always yields the same values.
    /// Before [`RequestContext::extract_api_key`] the key is empty.
    pub fn fill_check_request_info(&mut self, info: &mut CheckRequestInfo) {
        self.fill_operation_info(&mut info.operation);
        info.service_name = self.service.service_name().to_string();
        info.service_config_id = self.service.service_config_id().to_string();
        info.metric_costs = self.method.method_info.metric_costs().to_vec();
        info.trace_context = Some(self.trace.trace_context());
    }

    /// Registers the function that receives the Check outcome.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] if one is already registered
    /// or Check has already completed.
    pub fn set_check_continuation(
        &mut self,
        continuation: impl FnOnce(CheckStatus) + Send + 'static,
    ) -> GatewayResult<()> {
        if self.continuation.is_some() || self.continuation_fired || self.state.is_terminal() {
            return Err(self.violation("continuation_reregistered", RequestState::CheckCompleted));
        }
        self.continuation = Some(Box::new(continuation));
        Ok(())
    }

    /// Registers a continuation that forwards the outcome to a future.
    ///
    /// # Errors
    ///
    /// Same as [`RequestContext::set_check_continuation`].
    pub fn check_receiver(&mut self) -> GatewayResult<oneshot::Receiver<CheckStatus>> {
        let (tx, rx) = oneshot::channel();
        self.set_check_continuation(move |status| {
            // The receiver may have given up waiting.
            let _ = tx.send(status);
        })?;
        Ok(rx)
    }

    /// Marks the Check as sent to the control plane.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] unless the key was just extracted.
    pub fn mark_check_dispatched(&mut self) -> GatewayResult<()> {
        if self.state != RequestState::KeyExtracted {
            return Err(self.violation("check_dispatched_out_of_order", RequestState::CheckDispatched));
        }
        self.check_dispatched_at = Some(Instant::now());
        self.trace.start_check();
        self.advance(RequestState::CheckDispatched);
        Ok(())
    }

    /// Records what the control plane said about the key and the consumer.
    ///
    /// The control plane's key verdict replaces the policy default and is
    /// kept by a later successful [`RequestContext::complete_check`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] once Check has completed.
    pub fn record_check_response(&mut self, response: &CheckResponseInfo) -> GatewayResult<()> {
        if self.state >= RequestState::CheckCompleted {
            return Err(self.violation(
                "check_response_after_completion",
                RequestState::CheckCompleted,
            ));
        }
        self.is_api_key_valid = response.is_api_key_valid;
        self.consumer_project_id.clone_from(&response.consumer_project_id);
        Ok(())
    }

    /// Records the Check outcome and fires the continuation.
    ///
    /// Backend-unavailable outcomes (transport failure, timeout) are waived
    /// to success when the service fails open, or when the method needs
    /// neither a key, quota, nor authentication. The continuation receives
    /// the outcome after that policy is applied.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] on a second call; the
    /// continuation is not fired again.
    pub fn complete_check(&mut self, status: CheckStatus) -> GatewayResult<()> {
        if self.continuation_fired {
            return Err(self.violation("check_completed_twice", RequestState::CheckCompleted));
        }
        if !self.state.can_advance_to(RequestState::CheckCompleted) {
            return Err(self.violation(
                "check_completed_out_of_order",
                RequestState::CheckCompleted,
            ));
        }

        let status = self.apply_failure_policy(status);
        let label = match &status {
            Ok(()) if self.check_waived => "waived",
            Ok(()) => "ok",
            Err(error) => {
                if error.invalidates_api_key() {
                    self.is_api_key_valid = false;
                }
                self.error_cause = Some(error.code());
                error.code()
            }
        };

        record_check(label, self.check_dispatched_at.map(|at| at.elapsed()));
        self.trace.finish_check(label);
        tracing::info!(
            parent: self.trace.span(),
            operation_id = %self.operation_id,
            selector = %self.method.selector(),
            status = label,
            "check completed"
        );

        self.advance(RequestState::CheckCompleted);
        self.continuation_fired = true;
        match self.continuation.take() {
            Some(continuation) => continuation(status),
            None => tracing::debug!(
                operation_id = %self.operation_id,
                "check completed with no continuation registered"
            ),
        }
        Ok(())
    }

    fn apply_failure_policy(&mut self, status: CheckStatus) -> CheckStatus {
        match status {
            Err(error) if error.is_backend_unavailable() && self.waives_unavailable() => {
                tracing::warn!(
                    operation_id = %self.operation_id,
                    selector = %self.method.selector(),
                    error = %error,
                    "control plane unavailable, check waived"
                );
                self.error_cause = Some(error.code());
                self.check_waived = true;
                Ok(())
            }
            other => other,
        }
    }

    fn waives_unavailable(&self) -> bool {
        self.service.failure_policy() == CheckFailurePolicy::FailOpen
            || !self.method.method_info.fails_closed()
    }

    /// Records the verified user on the request and the token's issuer and
    /// first audience on the context.
    pub fn set_user_info(&mut self, info: UserInfo) {
        self.auth_issuer.clone_from(&info.issuer);
        if let Some(audience) = info.audiences.first() {
            self.auth_audience.clone_from(audience);
        }
        if let Some(request) = self.request.as_deref_mut() {
            request.set_user_info(info);
        }
    }

    /// Records the raw auth token on the request.
    pub fn set_auth_token(&mut self, token: &str) {
        if let Some(request) = self.request.as_deref_mut() {
            request.set_auth_token(token);
        }
    }

    /// Records the auth token issuer for the Report.
    pub fn set_auth_issuer(&mut self, issuer: impl Into<String>) {
        self.auth_issuer = issuer.into();
    }

    /// Records the auth token audience for the Report.
    pub fn set_auth_audience(&mut self, audience: impl Into<String>) {
        self.auth_audience = audience.into();
    }

    /// Fills a Report request from the finished response.
    ///
    /// Reads the response, the facts recorded by Check, and the snapshot
    /// taken at construction; never the request itself.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] unless Check has completed and
    /// no Report was filled yet.
    pub fn fill_report_request_info(
        &mut self,
        response: &dyn Response,
        info: &mut ReportRequestInfo,
    ) -> GatewayResult<()> {
        if self.state != RequestState::CheckCompleted {
            let kind = if self.state < RequestState::CheckCompleted {
                "report_before_check_completed"
            } else {
                "report_out_of_order"
            };
            return Err(self.violation(kind, RequestState::ReportFilled));
        }

        self.trace.start_report(response.status_code());

        self.fill_operation_info(&mut info.operation);
        self.fill_location(info);
        self.fill_compute_platform(info);
        self.fill_log_message(response, info);

        info.service_name = self.service.service_name().to_string();
        info.service_config_id = self.service.service_config_id().to_string();
        info.http_method.clone_from(&self.snapshot.http_method);
        info.url.clone_from(&self.snapshot.unparsed_path);
        info.protocol = self.snapshot.protocol;

        info.response_code = response.status_code();
        info.request_size = response.request_size();
        info.response_size = response.response_size();
        info.latency = response.latency();

        info.auth_issuer.clone_from(&self.auth_issuer);
        info.auth_audience.clone_from(&self.auth_audience);
        info.is_api_key_valid = self.is_api_key_valid;
        info.error_cause = self.error_cause.map(ToString::to_string);

        self.advance(RequestState::ReportFilled);
        Ok(())
    }

    /// Fills the fields Check and Report share.
    pub fn fill_operation_info(&mut self, operation: &mut OperationInfo) {
        operation.referer = self.http_referer().to_string();
        operation.operation_id = self.operation_id.to_string();
        operation.operation_name = self.method.selector().to_string();
        operation.api_key.clone_from(&self.api_key);
        operation.producer_project_id = self.service.producer_project_id().to_string();
        operation.consumer_project_id.clone_from(&self.consumer_project_id);
        operation.client_ip.clone_from(&self.snapshot.client_ip);
        operation.request_start_time = Some(self.snapshot.start_time);
    }

    /// Fills the best-effort location tag. Empty when unknown.
    pub fn fill_location(&self, info: &mut ReportRequestInfo) {
        info.location = self.service.location_for(&self.snapshot.client_ip);
    }

    /// Fills the compute platform descriptor.
    pub fn fill_compute_platform(&self, info: &mut ReportRequestInfo) {
        info.compute_platform = self.service.compute_platform();
    }

    /// Fills the one-line summary of the call.
    pub fn fill_log_message(&self, response: &dyn Response, info: &mut ReportRequestInfo) {
        info.log_message = format!(
            "Method: {} Status: {} Latency: {}ms",
            self.method.selector(),
            response.status_code(),
            response.latency().request_time.as_millis()
        );
    }

    /// Ends the context's work. Valid once Check has completed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] before Check completes or
    /// after the context has already ended.
    pub fn finish(&mut self) -> GatewayResult<()> {
        if !matches!(
            self.state,
            RequestState::CheckCompleted | RequestState::ReportFilled
        ) {
            return Err(self.violation("finish_out_of_order", RequestState::Done));
        }
        tracing::debug!(
            parent: self.trace.span(),
            operation_id = %self.operation_id,
            http.path = %self.snapshot.path,
            elapsed_ms = u64::try_from(self.snapshot.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request finished"
        );
        self.advance(RequestState::Done);
        Ok(())
    }

    /// Abandons the call. No Report is sent.
    ///
    /// A registered continuation that has not fired receives
    /// [`GatewayError::for_pending_check`] of `error`: a deadline or
    /// transport failure keeps its kind, anything else becomes
    /// [`GatewayError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidState`] if the context already ended.
    pub fn abort(&mut self, error: &GatewayError) -> GatewayResult<()> {
        if self.state.is_terminal() {
            return Err(self.violation("abort_after_terminal", RequestState::Failed));
        }

        tracing::warn!(
            parent: self.trace.span(),
            operation_id = %self.operation_id,
            state = %self.state,
            error = %error,
            "request aborted"
        );
        self.error_cause = Some(error.code());
        self.trace.finish_check(error.code());
        self.advance(RequestState::Failed);

        if let Some(continuation) = self.continuation.take() {
            self.continuation_fired = true;
            if let Some(at) = self.check_dispatched_at {
                record_check(error.code(), Some(at.elapsed()));
            }
            continuation(Err(error.for_pending_check()));
        }
        Ok(())
    }

    /// Hands the request back to the transport.
    ///
    /// Report filling keeps working from the snapshot taken at construction.
    pub fn release_request(&mut self) -> Option<Box<dyn Request>> {
        // Cache the referer first so Report still carries it.
        let _ = self.http_referer();
        self.request.take()
    }

    /// The `referer` header, read once and cached.
    pub fn http_referer(&mut self) -> &str {
        if self.http_referer.is_none() {
            let referer = self
                .request
                .as_deref()
                .and_then(|request| request.find_header("referer"))
                .unwrap_or_default();
            self.http_referer = Some(referer);
        }
        self.http_referer.as_deref().unwrap_or_default()
    }

    /// The request, unless it was released.
    #[must_use]
    pub fn request(&self) -> Option<&dyn Request> {
        self.request.as_deref()
    }

    /// Mutable access to the request, unless it was released.
    pub fn request_mut(&mut self) -> Option<&mut (dyn Request + 'static)> {
        self.request.as_deref_mut()
    }

    /// The shared service context.
    #[must_use]
    pub fn service(&self) -> &Arc<ServiceContext> {
        &self.service
    }

    /// The resolved method.
    #[must_use]
    pub fn method_call_info(&self) -> &MethodCallInfo {
        &self.method
    }

    /// The operation id used by both Check and Report.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// The extracted API key, empty when none was found or before extraction.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether the API key is considered valid.
    #[must_use]
    pub const fn is_api_key_valid(&self) -> bool {
        self.is_api_key_valid
    }

    /// Issuer of the caller's auth token, empty if none.
    #[must_use]
    pub fn auth_issuer(&self) -> &str {
        &self.auth_issuer
    }

    /// Audience of the caller's auth token, empty if none.
    #[must_use]
    pub fn auth_audience(&self) -> &str {
        &self.auth_audience
    }

    /// Consumer project learned from Check, empty until then.
    #[must_use]
    pub fn consumer_project_id(&self) -> &str {
        &self.consumer_project_id
    }

    /// Code of the Check failure, if any.
    #[must_use]
    pub const fn error_cause(&self) -> Option<&'static str> {
        self.error_cause
    }

    /// True when an unavailable control plane was waived by policy.
    #[must_use]
    pub const fn check_waived(&self) -> bool {
        self.check_waived
    }

    /// The request's span tree.
    #[must_use]
    pub fn trace(&self) -> &RequestTrace {
        &self.trace
    }

    /// The root `pylon.request` span, for instrumenting transport work.
    #[must_use]
    pub fn span(&self) -> &Span {
        self.trace.span()
    }

    fn advance(&mut self, next: RequestState) {
        debug_assert!(self.state.can_advance_to(next));
        self.state = next;
        self.trace.record_state(next.as_str());
    }

    fn violation(&self, kind: &'static str, attempted: RequestState) -> GatewayError {
        record_contract_violation(kind);
        let error = GatewayError::InvalidState {
            from: self.state.as_str(),
            to: attempted.as_str(),
        };
        match self.service.contract_mode() {
            ContractMode::Panic => {
                panic!("request context contract violated ({kind}): {error}")
            }
            ContractMode::Log => tracing::error!(
                operation_id = %self.operation_id,
                kind,
                error = %error,
                "request context contract violated"
            ),
        }
        error
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.take() {
            continuation(Err(GatewayError::cancelled(
                "request context dropped before check completed",
            )));
        }
        if !self.state.is_terminal() {
            tracing::debug!(
                operation_id = %self.operation_id,
                state = %self.state,
                "request context dropped before finishing"
            );
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("operation_id", &self.operation_id)
            .field("selector", &self.method.selector())
            .field("state", &self.state)
            .field("api_key_present", &!self.api_key.is_empty())
            .field("is_api_key_valid", &self.is_api_key_valid)
            .field("request_released", &self.request.is_none())
            .finish_non_exhaustive()
    }
}

fn find_api_key(request: &dyn Request, query_params: &[String], headers: &[String]) -> Option<String> {
    query_params
        .iter()
        .find_map(|name| request.find_query(name).filter(|value| !value.is_empty()))
        .or_else(|| {
            headers
                .iter()
                .find_map(|name| request.find_header(name).filter(|value| !value.is_empty()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_core::{KeyValidityPolicy, MethodInfo, TransportError};
    use pylon_test::{MockControlClient, TestRequest, TestResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn service_with(mode: ContractMode, validity: KeyValidityPolicy) -> Arc<ServiceContext> {
        Arc::new(
            ServiceContext::builder("library.example.com", Arc::new(MockControlClient::new()))
                .config_id("cfg-1")
                .producer_project_id("library-prod")
                .contract_mode(mode)
                .key_validity(validity)
                .route("GET", "/v1/items", MethodInfo::builder("items.get").build())
                .route(
                    "GET",
                    "/v1/public",
                    MethodInfo::builder("public.get")
                        .allow_unregistered_calls(true)
                        .build(),
                )
                .route(
                    "GET",
                    "/v1/custom",
                    MethodInfo::builder("custom.get")
                        .api_key_header("x-goog-api-key")
                        .build(),
                )
                .build()
                .unwrap(),
        )
    }

    fn service() -> Arc<ServiceContext> {
        service_with(ContractMode::Log, KeyValidityPolicy::Optimistic)
    }

    fn context(uri: &str) -> RequestContext {
        let request = TestRequest::get(uri).build().unwrap();
        RequestContext::new(service(), request.boxed()).unwrap()
    }

    #[test]
    fn test_routing_failure() {
        let request = TestRequest::get("/v1/nowhere").build().unwrap();
        let err = RequestContext::new(service(), request.boxed()).unwrap_err();
        assert!(matches!(err, GatewayError::Routing { .. }));
    }

    #[test]
    fn test_identity_only_at_construction() {
        let ctx = context("/v1/items?key=abc");
        assert_eq!(ctx.state(), RequestState::Created);
        assert_eq!(ctx.api_key(), "");
        assert!(ctx.is_api_key_valid());
        assert_eq!(ctx.method_call_info().selector(), "items.get");
    }

    #[test]
    fn test_pessimistic_default() {
        let service = service_with(ContractMode::Log, KeyValidityPolicy::Pessimistic);
        let request = TestRequest::get("/v1/items").build().unwrap();
        let ctx = RequestContext::new(service, request.boxed()).unwrap();
        assert!(!ctx.is_api_key_valid());
    }

    #[test]
    fn test_key_precedence_query_before_header() {
        let request = TestRequest::get("/v1/items?api_key=from-query")
            .header("x-api-key", "from-header")
            .build()
            .unwrap();
        let mut ctx = RequestContext::new(service(), request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        assert_eq!(ctx.api_key(), "from-query");
    }

    #[test]
    fn test_key_query_param_order() {
        let mut ctx = context("/v1/items?api_key=second&key=first");
        ctx.extract_api_key().unwrap();
        assert_eq!(ctx.api_key(), "first");
    }

    #[test]
    fn test_key_from_header() {
        let request = TestRequest::get("/v1/items")
            .header("X-API-Key", "hdr")
            .build()
            .unwrap();
        let mut ctx = RequestContext::new(service(), request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        assert_eq!(ctx.api_key(), "hdr");
        assert_eq!(ctx.state(), RequestState::KeyExtracted);
    }

    #[test]
    fn test_method_override_replaces_defaults() {
        let request = TestRequest::get("/v1/custom?key=ignored")
            .header("x-goog-api-key", "goog")
            .build()
            .unwrap();
        let mut ctx = RequestContext::new(service(), request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        assert_eq!(ctx.api_key(), "goog");
    }

    #[test]
    fn test_reextraction_is_violation_in_log_mode() {
        let mut ctx = context("/v1/items?key=abc");
        ctx.extract_api_key().unwrap();
        let err = ctx.extract_api_key().unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(ctx.api_key(), "abc");
    }

    #[test]
    #[should_panic(expected = "api_key_reextracted")]
    fn test_reextraction_panics_in_panic_mode() {
        let service = service_with(ContractMode::Panic, KeyValidityPolicy::Optimistic);
        let request = TestRequest::get("/v1/items").build().unwrap();
        let mut ctx = RequestContext::new(service, request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        let _ = ctx.extract_api_key();
    }

    #[test]
    fn test_fill_check_is_repeatable() {
        let request = TestRequest::get("/v1/items?key=K9")
            .referer("https://app.example.com/")
            .client_ip("10.1.1.1")
            .build()
            .unwrap();
        let mut ctx = RequestContext::new(service(), request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();

        let mut first = CheckRequestInfo::default();
        let mut second = CheckRequestInfo::default();
        ctx.fill_check_request_info(&mut first);
        ctx.fill_check_request_info(&mut second);

        assert_eq!(first, second);
        assert_eq!(first.operation.api_key, "K9");
        assert_eq!(first.operation.operation_id, ctx.operation_id().to_string());
        assert_eq!(first.operation.referer, "https://app.example.com/");
        assert_eq!(first.operation.client_ip, "10.1.1.1");
        assert_eq!(first.operation.producer_project_id, "library-prod");
        assert_eq!(first.service_config_id, "cfg-1");
        assert!(first.trace_context.is_some());
    }

    #[test]
    fn test_fill_check_before_extraction_has_empty_key() {
        let mut ctx = context("/v1/items?key=K9");
        let mut info = CheckRequestInfo::default();
        ctx.fill_check_request_info(&mut info);
        assert_eq!(info.operation.api_key, "");
    }

    #[test]
    fn test_continuation_fires_once() {
        let mut ctx = context("/v1/items?key=abc");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        ctx.set_check_continuation(move |status| {
            assert!(status.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        ctx.complete_check(Ok(())).unwrap();
        assert!(ctx.complete_check(Ok(())).is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state(), RequestState::CheckCompleted);
    }

    #[test]
    #[should_panic(expected = "check_completed_twice")]
    fn test_second_completion_panics_in_panic_mode() {
        let service = service_with(ContractMode::Panic, KeyValidityPolicy::Optimistic);
        let request = TestRequest::get("/v1/items").build().unwrap();
        let mut ctx = RequestContext::new(service, request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        ctx.complete_check(Ok(())).unwrap();
        let _ = ctx.complete_check(Ok(()));
    }

    #[test]
    fn test_second_continuation_rejected() {
        let mut ctx = context("/v1/items");
        ctx.set_check_continuation(|_| {}).unwrap();
        assert!(ctx.set_check_continuation(|_| {}).is_err());
    }

    #[test]
    fn test_key_invalid_clears_validity() {
        let mut ctx = context("/v1/items?key=bad");
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        ctx.complete_check(Err(GatewayError::key_invalid("revoked"))).unwrap();

        assert!(!ctx.is_api_key_valid());
        assert_eq!(ctx.error_cause(), Some("API_KEY_INVALID"));
    }

    #[test]
    fn test_record_check_response() {
        let mut ctx = context("/v1/items?key=abc");
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        ctx.record_check_response(&CheckResponseInfo::allowed("consumer-7"))
            .unwrap();
        ctx.complete_check(Ok(())).unwrap();

        assert_eq!(ctx.consumer_project_id(), "consumer-7");
        assert!(ctx.record_check_response(&CheckResponseInfo::allowed("x")).is_err());
    }

    #[test]
    fn test_ok_check_keeps_control_plane_key_verdict() {
        let mut ctx = context("/v1/public?key=BAD");
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        let response = CheckResponseInfo {
            is_api_key_valid: false,
            ..CheckResponseInfo::allowed("consumer-1")
        };
        ctx.record_check_response(&response).unwrap();
        ctx.complete_check(Ok(())).unwrap();

        assert!(!ctx.is_api_key_valid());
        let mut info = ReportRequestInfo::default();
        ctx.fill_report_request_info(&TestResponse::ok(), &mut info)
            .unwrap();
        assert!(!info.is_api_key_valid);
    }

    #[test]
    fn test_ok_check_without_key_keeps_policy_default() {
        for (policy, expected) in [
            (KeyValidityPolicy::Optimistic, true),
            (KeyValidityPolicy::Pessimistic, false),
        ] {
            let service = service_with(ContractMode::Log, policy);
            let request = TestRequest::get("/v1/public").build().unwrap();
            let mut ctx = RequestContext::new(service, request.boxed()).unwrap();
            ctx.extract_api_key().unwrap();
            ctx.mark_check_dispatched().unwrap();
            ctx.complete_check(Ok(())).unwrap();

            assert_eq!(ctx.is_api_key_valid(), expected, "{policy:?}");
        }
    }

    #[test]
    fn test_fail_closed_keeps_transport_error() {
        let mut ctx = context("/v1/items?key=abc");
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        let mut rx = ctx.check_receiver().unwrap();
        ctx.complete_check(Err(TransportError::Unavailable("down".to_string()).into()))
            .unwrap();

        let status = rx.try_recv().unwrap();
        assert!(status.unwrap_err().is_backend_unavailable());
        assert!(!ctx.check_waived());
        // Unknown outcome leaves the optimistic default in place.
        assert!(ctx.is_api_key_valid());
    }

    #[test]
    fn test_unavailable_waived_for_open_method() {
        let mut ctx = context("/v1/public");
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        let mut rx = ctx.check_receiver().unwrap();
        ctx.complete_check(Err(GatewayError::Timeout {
            elapsed: Duration::from_millis(5),
        }))
        .unwrap();

        assert!(rx.try_recv().unwrap().is_ok());
        assert!(ctx.check_waived());
        assert_eq!(ctx.error_cause(), Some("CHECK_TIMEOUT"));
    }

    #[test]
    fn test_report_before_check_is_violation() {
        let mut ctx = context("/v1/items");
        let mut info = ReportRequestInfo::default();
        let err = ctx
            .fill_report_request_info(&TestResponse::ok(), &mut info)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(info, ReportRequestInfo::default());
    }

    #[test]
    fn test_report_uses_snapshot_after_release() {
        let request = TestRequest::get("/v1/items?key=abc")
            .referer("https://ref.example.com/")
            .client_ip("192.0.2.4")
            .build()
            .unwrap();
        let mut ctx = RequestContext::new(service(), request.boxed()).unwrap();
        ctx.extract_api_key().unwrap();
        ctx.mark_check_dispatched().unwrap();
        ctx.complete_check(Ok(())).unwrap();

        let released = ctx.release_request();
        assert!(released.is_some());
        assert!(ctx.request().is_none());

        let response = TestResponse::new(201)
            .with_sizes(10, 20)
            .with_latency(Duration::from_millis(40), Duration::from_millis(30));
        let mut info = ReportRequestInfo::default();
        ctx.fill_report_request_info(&response, &mut info).unwrap();

        assert_eq!(info.http_method, "GET");
        assert_eq!(info.url, "/v1/items?key=abc");
        assert_eq!(info.operation.referer, "https://ref.example.com/");
        assert_eq!(info.operation.client_ip, "192.0.2.4");
        assert_eq!(info.response_code, 201);
        assert_eq!(info.response_size, 20);
        assert_eq!(info.latency.overhead_time, Duration::from_millis(10));
        assert_eq!(info.log_message, "Method: items.get Status: 201 Latency: 40ms");
        assert_eq!(info.protocol, Protocol::Http);
        assert_eq!(ctx.state(), RequestState::ReportFilled);
    }

    #[test]
    fn test_user_info_recorded() {
        let mut ctx = context("/v1/items");
        ctx.set_user_info(UserInfo {
            id: "alice".to_string(),
            issuer: "https://issuer.example.com".to_string(),
            audiences: vec!["library".to_string(), "other".to_string()],
            ..UserInfo::default()
        });
        ctx.set_auth_token("jwt");

        assert_eq!(ctx.auth_issuer(), "https://issuer.example.com");
        assert_eq!(ctx.auth_audience(), "library");
        let request = ctx.request().unwrap();
        assert_eq!(request.auth_state().auth_token(), Some("jwt"));
    }

    #[test]
    fn test_abort_cancels_pending_continuation() {
        let mut ctx = context("/v1/items");
        let mut rx = ctx.check_receiver().unwrap();
        ctx.abort(&GatewayError::malformed("bad body")).unwrap();

        assert_eq!(ctx.state(), RequestState::Failed);
        let status = rx.try_recv().unwrap();
        assert_eq!(status.unwrap_err().code(), "CHECK_CANCELLED");

        let mut info = ReportRequestInfo::default();
        assert!(ctx.fill_report_request_info(&TestResponse::ok(), &mut info).is_err());
        assert!(ctx.abort(&GatewayError::malformed("again")).is_err());
    }

    #[test]
    fn test_deadline_abort_keeps_timeout_kind() {
        let mut ctx = context("/v1/items?key=abc");
        ctx.extract_api_key().unwrap();
        let mut rx = ctx.check_receiver().unwrap();
        ctx.mark_check_dispatched().unwrap();
        ctx.abort(&GatewayError::Timeout {
            elapsed: Duration::from_millis(750),
        })
        .unwrap();

        let error = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(error.code(), "CHECK_TIMEOUT");
        assert!(error.is_backend_unavailable());
        assert!(!error.is_denial());
        assert_eq!(ctx.error_cause(), Some("CHECK_TIMEOUT"));
        assert_eq!(ctx.state(), RequestState::Failed);
    }

    #[test]
    fn test_drop_cancels_pending_continuation() {
        let mut ctx = context("/v1/items");
        let mut rx = ctx.check_receiver().unwrap();
        drop(ctx);
        assert_eq!(rx.try_recv().unwrap().unwrap_err().code(), "CHECK_CANCELLED");
    }

    #[test]
    fn test_finish_requires_completed_check() {
        let mut ctx = context("/v1/items");
        assert!(ctx.finish().is_err());
        ctx.extract_api_key().unwrap();
        ctx.complete_check(Err(GatewayError::key_missing("items.get")))
            .unwrap();
        ctx.finish().unwrap();
        assert_eq!(ctx.state(), RequestState::Done);
    }
}
