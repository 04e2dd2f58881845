//! The process-wide service context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use pylon_config::{ApiKeySection, GatewayConfig};
use pylon_control::{ControlClient, ReportDispatcher};
use pylon_core::{
    CheckFailurePolicy, ComputePlatform, ContractMode, GatewayError, GatewayResult,
    KeyValidityPolicy, MethodCallInfo, MethodInfo,
};
use pylon_router::Router;

use crate::error::BuildError;
use crate::location::LocationResolver;

/// Read-only facts shared by every request of one managed service.
///
/// Built once at startup and shared as `Arc<ServiceContext>`; nothing in it
/// changes afterwards, so concurrent requests read it without locking.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use pylon_context::ServiceContext;
/// use pylon_core::MethodInfo;
/// use pylon_test::MockControlClient;
///
/// let service = ServiceContext::builder("library.example.com", Arc::new(MockControlClient::new()))
///     .config_id("2024-05-01r0")
///     .route("GET", "/v1/items/{id}", MethodInfo::builder("items.get").build())
///     .build()
///     .unwrap();
///
/// let call = service.resolve("GET", "/v1/items/42").unwrap();
/// assert_eq!(call.selector(), "items.get");
/// assert_eq!(call.variable_bindings.get("id"), Some("42"));
/// ```
pub struct ServiceContext {
    service_name: String,
    service_config_id: String,
    producer_project_id: String,
    router: Router<Arc<MethodInfo>>,
    control_client: Arc<dyn ControlClient>,
    report_dispatcher: ReportDispatcher,
    api_key_query_params: Vec<String>,
    api_key_headers: Vec<String>,
    key_validity: KeyValidityPolicy,
    failure_policy: CheckFailurePolicy,
    contract_mode: ContractMode,
    check_timeout: Duration,
    report_enabled: bool,
    compute_platform: ComputePlatform,
    zone: String,
    location_resolver: Option<Arc<dyn LocationResolver>>,
}

impl ServiceContext {
    /// Starts building a service context.
    #[must_use]
    pub fn builder(
        service_name: impl Into<String>,
        control_client: Arc<dyn ControlClient>,
    ) -> ServiceContextBuilder {
        ServiceContextBuilder::new(service_name, control_client)
    }

    /// Builds the service context and its routing table from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the configuration is invalid or two methods
    /// claim the same route.
    pub fn from_config(
        config: &GatewayConfig,
        control_client: Arc<dyn ControlClient>,
    ) -> Result<Self, BuildError> {
        config.validate()?;

        let mut builder = Self::builder(&config.service.name, control_client)
            .config_id(&config.service.config_id)
            .producer_project_id(&config.service.producer_project_id)
            .api_key_query_params(config.api_key.query_params.clone())
            .api_key_headers(config.api_key.headers.clone())
            .key_validity(config.api_key.validity_policy)
            .failure_policy(config.control.failure_policy)
            .contract_mode(config.control.contract_mode.unwrap_or_default())
            .check_timeout(config.check_timeout())
            .report_enabled(config.control.report_enabled)
            .compute_platform(config.platform.compute_platform)
            .zone(&config.platform.zone);

        for method in &config.methods {
            builder = builder.route(&method.http_method, &method.path, method.to_method_info());
        }

        builder.build()
    }

    /// Resolves a call to the method it invokes.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Routing`] when no configured method matches.
    pub fn resolve(&self, http_method: &str, path: &str) -> GatewayResult<MethodCallInfo> {
        let method = Method::from_bytes(http_method.as_bytes())
            .map_err(|_| GatewayError::routing(http_method, path))?;

        self.router
            .lookup(&method, path)
            .map(|found| MethodCallInfo::new(Arc::clone(found.value), found.bindings))
            .ok_or_else(|| GatewayError::routing(http_method, path))
    }

    /// Managed service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Service configuration id.
    #[must_use]
    pub fn service_config_id(&self) -> &str {
        &self.service_config_id
    }

    /// Project that owns the service.
    #[must_use]
    pub fn producer_project_id(&self) -> &str {
        &self.producer_project_id
    }

    /// Client used for Check.
    #[must_use]
    pub fn control_client(&self) -> &Arc<dyn ControlClient> {
        &self.control_client
    }

    /// Dispatcher used for Report.
    #[must_use]
    pub fn report_dispatcher(&self) -> &ReportDispatcher {
        &self.report_dispatcher
    }

    /// Default query parameters searched for an API key.
    #[must_use]
    pub fn api_key_query_params(&self) -> &[String] {
        &self.api_key_query_params
    }

    /// Default headers searched for an API key.
    #[must_use]
    pub fn api_key_headers(&self) -> &[String] {
        &self.api_key_headers
    }

    /// Starting value of `is_api_key_valid`.
    #[must_use]
    pub const fn key_validity(&self) -> KeyValidityPolicy {
        self.key_validity
    }

    /// What happens when the control plane is unreachable.
    #[must_use]
    pub const fn failure_policy(&self) -> CheckFailurePolicy {
        self.failure_policy
    }

    /// How repeated or out-of-order context calls are surfaced.
    #[must_use]
    pub const fn contract_mode(&self) -> ContractMode {
        self.contract_mode
    }

    /// Deadline for the Check RPC.
    #[must_use]
    pub const fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    /// Whether Reports are sent.
    #[must_use]
    pub const fn report_enabled(&self) -> bool {
        self.report_enabled
    }

    /// Platform recorded in Reports.
    #[must_use]
    pub const fn compute_platform(&self) -> ComputePlatform {
        self.compute_platform
    }

    /// Location tag for `client_ip`: the resolver's answer, else the zone.
    ///
    /// Returns an empty string when neither is known.
    #[must_use]
    pub fn location_for(&self, client_ip: &str) -> String {
        self.location_resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve(client_ip))
            .unwrap_or_else(|| self.zone.clone())
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.router.len()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("service_name", &self.service_name)
            .field("service_config_id", &self.service_config_id)
            .field("routes", &self.router.len())
            .field("key_validity", &self.key_validity)
            .field("failure_policy", &self.failure_policy)
            .field("contract_mode", &self.contract_mode)
            .field("check_timeout", &self.check_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ServiceContext`].
#[must_use]
pub struct ServiceContextBuilder {
    service_name: String,
    service_config_id: String,
    producer_project_id: String,
    control_client: Arc<dyn ControlClient>,
    routes: Vec<(String, String, MethodInfo)>,
    api_key_query_params: Vec<String>,
    api_key_headers: Vec<String>,
    key_validity: KeyValidityPolicy,
    failure_policy: CheckFailurePolicy,
    contract_mode: ContractMode,
    check_timeout: Duration,
    report_enabled: bool,
    compute_platform: ComputePlatform,
    zone: String,
    location_resolver: Option<Arc<dyn LocationResolver>>,
}

impl ServiceContextBuilder {
    fn new(service_name: impl Into<String>, control_client: Arc<dyn ControlClient>) -> Self {
        let api_key = ApiKeySection::default();
        Self {
            service_name: service_name.into(),
            service_config_id: String::new(),
            producer_project_id: String::new(),
            control_client,
            routes: Vec::new(),
            api_key_query_params: api_key.query_params,
            api_key_headers: api_key.headers,
            key_validity: api_key.validity_policy,
            failure_policy: CheckFailurePolicy::default(),
            contract_mode: ContractMode::default(),
            check_timeout: Duration::from_secs(1),
            report_enabled: true,
            compute_platform: ComputePlatform::default(),
            zone: String::new(),
            location_resolver: None,
        }
    }

    /// Sets the service configuration id.
    pub fn config_id(mut self, id: impl Into<String>) -> Self {
        self.service_config_id = id.into();
        self
    }

    /// Sets the producer project id.
    pub fn producer_project_id(mut self, id: impl Into<String>) -> Self {
        self.producer_project_id = id.into();
        self
    }

    /// Registers a method under `http_method` (or `*`) and a path template.
    pub fn route(mut self, http_method: &str, template: &str, info: MethodInfo) -> Self {
        self.routes
            .push((http_method.to_string(), template.to_string(), info));
        self
    }

    /// Replaces the default API key query parameters.
    pub fn api_key_query_params(mut self, names: Vec<String>) -> Self {
        self.api_key_query_params = names;
        self
    }

    /// Replaces the default API key headers.
    pub fn api_key_headers(mut self, names: Vec<String>) -> Self {
        self.api_key_headers = names;
        self
    }

    /// Sets the key validity policy.
    pub fn key_validity(mut self, policy: KeyValidityPolicy) -> Self {
        self.key_validity = policy;
        self
    }

    /// Sets the Check failure policy.
    pub fn failure_policy(mut self, policy: CheckFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the contract mode.
    pub fn contract_mode(mut self, mode: ContractMode) -> Self {
        self.contract_mode = mode;
        self
    }

    /// Sets the Check deadline.
    pub fn check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Enables or disables Reports.
    pub fn report_enabled(mut self, enabled: bool) -> Self {
        self.report_enabled = enabled;
        self
    }

    /// Sets the compute platform.
    pub fn compute_platform(mut self, platform: ComputePlatform) -> Self {
        self.compute_platform = platform;
        self
    }

    /// Sets the fallback location zone.
    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    /// Sets the location resolver.
    pub fn location_resolver(mut self, resolver: impl LocationResolver + 'static) -> Self {
        self.location_resolver = Some(Arc::new(resolver));
        self
    }

    /// Builds the routing table and the service context.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for an empty service name, an invalid HTTP
    /// method, or a route the router rejects.
    pub fn build(self) -> Result<ServiceContext, BuildError> {
        if self.service_name.trim().is_empty() {
            return Err(BuildError::MissingServiceName);
        }

        let mut router = Router::new();
        for (http_method, template, info) in self.routes {
            let selector = info.selector().to_string();
            let info = Arc::new(info);
            let inserted = if http_method == "*" {
                router.insert_any(&template, info)
            } else {
                let method = Method::from_bytes(http_method.as_bytes()).map_err(|_| {
                    BuildError::InvalidHttpMethod {
                        selector: selector.clone(),
                        http_method: http_method.clone(),
                    }
                })?;
                router.insert(&method, &template, info)
            };
            inserted.map_err(|source| BuildError::Route { selector, source })?;
        }

        tracing::info!(
            service = %self.service_name,
            config_id = %self.service_config_id,
            routes = router.len(),
            "service context built"
        );

        let report_dispatcher = ReportDispatcher::new(Arc::clone(&self.control_client));
        Ok(ServiceContext {
            service_name: self.service_name,
            service_config_id: self.service_config_id,
            producer_project_id: self.producer_project_id,
            router,
            control_client: self.control_client,
            report_dispatcher,
            api_key_query_params: self.api_key_query_params,
            api_key_headers: self.api_key_headers,
            key_validity: self.key_validity,
            failure_policy: self.failure_policy,
            contract_mode: self.contract_mode,
            check_timeout: self.check_timeout,
            report_enabled: self.report_enabled,
            compute_platform: self.compute_platform,
            zone: self.zone,
            location_resolver: self.location_resolver,
        })
    }
}
