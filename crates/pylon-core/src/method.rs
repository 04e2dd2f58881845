//! Resolved API method descriptors.
//!
//! A [`MethodInfo`] is built once per configured method when the service
//! starts; a [`MethodCallInfo`] pairs it with what routing learned about one
//! particular call.

use std::sync::Arc;

use pylon_router::Bindings;
use serde::{Deserialize, Serialize};

/// Immutable descriptor of one logical API method.
///
/// # Example
///
/// ```
/// use pylon_core::MethodInfo;
///
/// let info = MethodInfo::builder("items.get")
///     .api_key_query_param("token")
///     .metric_cost("read_requests", 1)
///     .build();
///
/// assert!(info.requires_api_key());
/// assert!(info.requires_quota());
/// assert_eq!(info.api_key_query_params(), Some(&["token".to_string()][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    selector: String,
    allow_unregistered_calls: bool,
    requires_auth: bool,
    skip_service_control: bool,
    api_key_query_params: Option<Vec<String>>,
    api_key_headers: Option<Vec<String>>,
    metric_costs: Vec<(String, i64)>,
    body_field_path: Option<String>,
}

impl MethodInfo {
    /// Starts building a descriptor for `selector`.
    #[must_use]
    pub fn builder(selector: impl Into<String>) -> MethodInfoBuilder {
        MethodInfoBuilder::new(selector)
    }

    /// Fully qualified method name, e.g. `items.get`.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// True when callers may invoke the method without an API key.
    #[must_use]
    pub const fn allow_unregistered_calls(&self) -> bool {
        self.allow_unregistered_calls
    }

    /// True when the method needs an API key.
    #[must_use]
    pub const fn requires_api_key(&self) -> bool {
        !self.allow_unregistered_calls
    }

    /// True when the method is quota-metered.
    #[must_use]
    pub fn requires_quota(&self) -> bool {
        !self.metric_costs.is_empty()
    }

    /// True when an authentication provider guards the method.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// True when Check is denied rather than waived if the control plane is unreachable.
    #[must_use]
    pub fn fails_closed(&self) -> bool {
        self.requires_api_key() || self.requires_quota() || self.requires_auth
    }

    /// True when the method bypasses Check and Report entirely.
    #[must_use]
    pub const fn skip_service_control(&self) -> bool {
        self.skip_service_control
    }

    /// Method-level query parameter names that replace the service defaults.
    #[must_use]
    pub fn api_key_query_params(&self) -> Option<&[String]> {
        self.api_key_query_params.as_deref()
    }

    /// Method-level header names that replace the service defaults.
    #[must_use]
    pub fn api_key_headers(&self) -> Option<&[String]> {
        self.api_key_headers.as_deref()
    }

    /// Quota metric names and the cost one call charges against each.
    #[must_use]
    pub fn metric_costs(&self) -> &[(String, i64)] {
        &self.metric_costs
    }

    /// Request field the HTTP body maps to, if any.
    #[must_use]
    pub fn body_field_path(&self) -> Option<&str> {
        self.body_field_path.as_deref()
    }
}

/// Builder for [`MethodInfo`].
#[derive(Debug, Clone)]
pub struct MethodInfoBuilder {
    info: MethodInfo,
}

impl MethodInfoBuilder {
    fn new(selector: impl Into<String>) -> Self {
        Self {
            info: MethodInfo {
                selector: selector.into(),
                allow_unregistered_calls: false,
                requires_auth: false,
                skip_service_control: false,
                api_key_query_params: None,
                api_key_headers: None,
                metric_costs: Vec::new(),
                body_field_path: None,
            },
        }
    }

    /// Lets callers invoke the method without an API key.
    pub fn allow_unregistered_calls(mut self, allow: bool) -> Self {
        self.info.allow_unregistered_calls = allow;
        self
    }

    /// Marks the method as guarded by an authentication provider.
    pub fn requires_auth(mut self, required: bool) -> Self {
        self.info.requires_auth = required;
        self
    }

    /// Makes the method bypass Check and Report.
    pub fn skip_service_control(mut self, skip: bool) -> Self {
        self.info.skip_service_control = skip;
        self
    }

    /// Adds a method-level query parameter to look for the API key in.
    pub fn api_key_query_param(mut self, name: impl Into<String>) -> Self {
        self.info
            .api_key_query_params
            .get_or_insert_with(Vec::new)
            .push(name.into());
        self
    }

    /// Adds a method-level header to look for the API key in.
    pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
        self.info
            .api_key_headers
            .get_or_insert_with(Vec::new)
            .push(name.into());
        self
    }

    /// Charges `cost` units of `metric` per call.
    pub fn metric_cost(mut self, metric: impl Into<String>, cost: i64) -> Self {
        self.info.metric_costs.push((metric.into(), cost));
        self
    }

    /// Sets the request field the body maps to.
    pub fn body_field_path(mut self, path: impl Into<String>) -> Self {
        self.info.body_field_path = Some(path.into());
        self
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(self) -> MethodInfo {
        self.info
    }
}

/// What routing resolved for one call.
#[derive(Debug, Clone)]
pub struct MethodCallInfo {
    /// Shared descriptor of the invoked method.
    pub method_info: Arc<MethodInfo>,
    /// Path-template variables bound by the call's path.
    pub variable_bindings: Bindings,
    /// Request field the body maps to, copied from the descriptor.
    pub body_field_path: Option<String>,
}

impl MethodCallInfo {
    /// Pairs a descriptor with the bindings routing produced.
    #[must_use]
    pub fn new(method_info: Arc<MethodInfo>, variable_bindings: Bindings) -> Self {
        let body_field_path = method_info.body_field_path().map(ToString::to_string);
        Self {
            method_info,
            variable_bindings,
            body_field_path,
        }
    }

    /// Shortcut for the method's selector.
    #[must_use]
    pub fn selector(&self) -> &str {
        self.method_info.selector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_require_key() {
        let info = MethodInfo::builder("items.list").build();
        assert!(info.requires_api_key());
        assert!(!info.requires_quota());
        assert!(!info.skip_service_control());
        assert!(info.fails_closed());
        assert!(info.api_key_headers().is_none());
    }

    #[test]
    fn test_open_method_fails_open() {
        let info = MethodInfo::builder("health.check")
            .allow_unregistered_calls(true)
            .build();
        assert!(!info.requires_api_key());
        assert!(!info.fails_closed());
    }

    #[test]
    fn test_quota_or_auth_forces_fail_closed() {
        let quota = MethodInfo::builder("a")
            .allow_unregistered_calls(true)
            .metric_cost("reads", 2)
            .build();
        assert!(quota.fails_closed());

        let auth = MethodInfo::builder("b")
            .allow_unregistered_calls(true)
            .requires_auth(true)
            .build();
        assert!(auth.fails_closed());
    }

    #[test]
    fn test_call_info_copies_body_field_path() {
        let info = Arc::new(
            MethodInfo::builder("items.create")
                .body_field_path("item")
                .build(),
        );
        let bindings: Bindings = [("shelf".to_string(), "3".to_string())].into_iter().collect();
        let call = MethodCallInfo::new(Arc::clone(&info), bindings);

        assert_eq!(call.selector(), "items.create");
        assert_eq!(call.body_field_path.as_deref(), Some("item"));
        assert_eq!(call.variable_bindings.get("shelf"), Some("3"));
    }
}
