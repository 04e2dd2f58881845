//! Field provenance between construction, Check and Report.

use std::sync::Arc;

use pylon_context::{RequestContext, RequestState, ServiceContext};
use pylon_control::{CheckRequestInfo, CheckResponseInfo, ReportRequestInfo};
use pylon_core::{
    ComputePlatform, ContractMode, GatewayError, MethodInfo, Protocol, UserInfo,
};
use pylon_test::{MockControlClient, TestRequest, TestResponse};

fn service() -> Arc<ServiceContext> {
    Arc::new(
        ServiceContext::builder("library.example.com", Arc::new(MockControlClient::new()))
            .config_id("2024-05-01r0")
            .producer_project_id("library-prod")
            .contract_mode(ContractMode::Log)
            .compute_platform(ComputePlatform::Kubernetes)
            .zone("us-central1-a")
            .route(
                "GET",
                "/v1/items",
                MethodInfo::builder("items.get")
                    .metric_cost("read_requests", 1)
                    .build(),
            )
            .route("GET", "/v1/items/{id}", MethodInfo::builder("items.fetch").build())
            .build()
            .unwrap(),
    )
}

fn start(request: TestRequest) -> RequestContext {
    RequestContext::new(service(), request.boxed()).unwrap()
}

fn run_check(ctx: &mut RequestContext, outcome: Result<(), GatewayError>) -> CheckRequestInfo {
    ctx.extract_api_key().unwrap();
    let mut check = CheckRequestInfo::default();
    ctx.fill_check_request_info(&mut check);
    ctx.mark_check_dispatched().unwrap();
    ctx.complete_check(outcome).unwrap();
    check
}

fn run_report(ctx: &mut RequestContext) -> ReportRequestInfo {
    let mut report = ReportRequestInfo::default();
    ctx.fill_report_request_info(&TestResponse::ok(), &mut report)
        .unwrap();
    ctx.finish().unwrap();
    report
}

#[test]
fn operation_id_is_shared_by_check_and_report() {
    let mut ctx = start(TestRequest::get("/v1/items?key=K1").build().unwrap());
    let id = ctx.operation_id().to_string();

    let check = run_check(&mut ctx, Ok(()));
    let report = run_report(&mut ctx);

    assert_eq!(check.operation.operation_id, id);
    assert_eq!(report.operation.operation_id, id);
    assert_eq!(ctx.state(), RequestState::Done);
}

#[test]
fn valid_key_scenario() {
    let mut ctx = start(TestRequest::get("/v1/items?api_key=K1").build().unwrap());
    let check = run_check(&mut ctx, Ok(()));

    assert_eq!(check.operation.api_key, "K1");
    assert_eq!(check.operation.operation_name, "items.get");
    assert_eq!(check.service_name, "library.example.com");
    assert_eq!(check.metric_costs, vec![("read_requests".to_string(), 1)]);

    let report = run_report(&mut ctx);
    assert!(report.is_api_key_valid);
    assert_eq!(report.operation.api_key, "K1");
    assert!(report.error_cause.is_none());
}

#[test]
fn invalid_key_is_reported() {
    let mut ctx = start(TestRequest::get("/v1/items?key=revoked").build().unwrap());
    run_check(&mut ctx, Err(GatewayError::key_invalid("key revoked")));

    let report = run_report(&mut ctx);
    assert!(!report.is_api_key_valid);
    assert_eq!(report.operation.api_key, "revoked");
    assert_eq!(report.error_cause.as_deref(), Some("API_KEY_INVALID"));
}

#[test]
fn missing_key_is_reported() {
    let mut ctx = start(TestRequest::get("/v1/items").build().unwrap());
    let mut rx = ctx.check_receiver().unwrap();
    ctx.extract_api_key().unwrap();
    ctx.complete_check(Err(GatewayError::key_missing("items.get")))
        .unwrap();

    let status = rx.try_recv().unwrap();
    assert!(matches!(status, Err(GatewayError::KeyMissing { .. })));

    let report = run_report(&mut ctx);
    assert!(!report.is_api_key_valid);
    assert_eq!(report.operation.api_key, "");
}

#[test]
fn auth_facts_flow_into_report() {
    let mut ctx = start(TestRequest::get("/v1/items?key=K1").build().unwrap());
    ctx.set_user_info(UserInfo {
        id: "alice".to_string(),
        issuer: "https://accounts.example.com".to_string(),
        audiences: vec!["library.example.com".to_string()],
        ..UserInfo::default()
    });
    run_check(&mut ctx, Ok(()));

    let report = run_report(&mut ctx);
    assert_eq!(report.auth_issuer, "https://accounts.example.com");
    assert_eq!(report.auth_audience, "library.example.com");
    assert_eq!(report.auth_issuer, ctx.auth_issuer());
    assert_eq!(report.is_api_key_valid, ctx.is_api_key_valid());
}

#[test]
fn consumer_project_flows_into_report() {
    let mut ctx = start(TestRequest::get("/v1/items?key=K1").build().unwrap());
    ctx.extract_api_key().unwrap();
    ctx.mark_check_dispatched().unwrap();
    ctx.record_check_response(&CheckResponseInfo::allowed("consumer-42"))
        .unwrap();
    ctx.complete_check(Ok(())).unwrap();

    let report = run_report(&mut ctx);
    assert_eq!(report.operation.consumer_project_id, "consumer-42");
    assert_eq!(report.operation.producer_project_id, "library-prod");
}

#[test]
fn report_carries_platform_location_and_request_facts() {
    let request = TestRequest::get("/v1/items/7?key=K1")
        .protocol(Protocol::Https)
        .client_ip("203.0.113.9")
        .build()
        .unwrap();
    let mut ctx = start(request);
    assert_eq!(ctx.method_call_info().variable_bindings.get("id"), Some("7"));
    run_check(&mut ctx, Ok(()));

    let report = run_report(&mut ctx);
    assert_eq!(report.compute_platform, ComputePlatform::Kubernetes);
    assert_eq!(report.location, "us-central1-a");
    assert_eq!(report.protocol, Protocol::Https);
    assert_eq!(report.url, "/v1/items/7?key=K1");
    assert_eq!(report.operation.client_ip, "203.0.113.9");
    assert_eq!(report.service_config_id, "2024-05-01r0");
    assert!(report.operation.request_start_time.is_some());
}

#[test]
fn inbound_traceparent_is_propagated_to_check() {
    let request = TestRequest::get("/v1/items?key=K1")
        .traceparent("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
        .build()
        .unwrap();
    let mut ctx = start(request);
    let check = run_check(&mut ctx, Ok(()));

    let trace = check.trace_context.unwrap();
    assert_eq!(trace.trace_id, "0af7651916cd43dd8448eb211c80319c");
    assert_ne!(trace.span_id, "b7ad6b7169203331");
    assert_eq!(trace.span_id, ctx.trace().check_span_id());
    assert_ne!(trace.span_id, ctx.trace().span_id());
    assert!(trace.sampled);
}
