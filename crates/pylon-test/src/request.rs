//! Test request building.

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use pylon_core::{AuthState, Protocol, Request};

use crate::error::TestError;

/// An in-memory [`Request`].
///
/// Repeated query parameters and headers are kept in order; lookups return
/// the first one.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    unparsed_path: String,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    client_ip: String,
    protocol: Protocol,
    auth: AuthState,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Returns the request boxed as the trait object the gateway consumes.
    #[must_use]
    pub fn boxed(self) -> Box<dyn Request> {
        Box::new(self)
    }
}

impl Request for TestRequest {
    fn http_method(&self) -> &str {
        self.method.as_str()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn unparsed_path(&self) -> &str {
        &self.unparsed_path
    }

    fn client_ip(&self) -> &str {
        &self.client_ip
    }

    fn find_query(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn find_header(&self, name: &str) -> Option<String> {
        // HeaderMap::get returns the first value of a repeated header.
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    fn auth_state_mut(&mut self) -> &mut AuthState {
        &mut self.auth
    }
}

/// Builder for [`TestRequest`].
///
/// Invalid input is remembered and reported by [`TestRequestBuilder::build`].
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    client_ip: String,
    protocol: Protocol,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            client_ip: "127.0.0.1".to_string(),
            protocol: Protocol::Http,
            error: None,
        }
    }

    /// Creates a builder from a method name such as `"GET"`.
    pub fn with_method(method: &str, uri: impl AsRef<str>) -> Self {
        match Method::from_bytes(method.as_bytes()) {
            Ok(method) => Self::new(method, uri),
            Err(_) => {
                let mut builder = Self::new(Method::GET, uri);
                builder.error = Some(TestError::InvalidMethod(method.to_string()));
                builder
            }
        }
    }

    /// Appends a header. Repeating a name keeps every value in order.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Sets the `referer` header.
    pub fn referer(self, referer: impl AsRef<str>) -> Self {
        self.header(http::header::REFERER.as_str(), referer)
    }

    /// Sets the W3C `traceparent` header.
    pub fn traceparent(self, traceparent: impl AsRef<str>) -> Self {
        self.header("traceparent", traceparent)
    }

    /// Sets the caller address. Defaults to `127.0.0.1`.
    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    /// Sets the wire protocol. Defaults to [`Protocol::Http`].
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Builds the request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e: http::uri::InvalidUri| TestError::InvalidUri(e.to_string()))?;

        let unparsed_path = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string);

        Ok(TestRequest {
            method: self.method,
            path: uri.path().to_string(),
            query: uri.query().map(parse_query).unwrap_or_default(),
            unparsed_path,
            headers: self.headers,
            client_ip: self.client_ip,
            protocol: self.protocol,
            auth: AuthState::default(),
        })
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(component: &str) -> String {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_core::UserInfo;

    #[test]
    fn test_find_query() {
        let request = TestRequest::get("/v1/items?key=abc123").build().unwrap();
        assert_eq!(request.find_query("key").as_deref(), Some("abc123"));
        assert_eq!(request.find_query("api_key"), None);
    }

    #[test]
    fn test_find_query_first_match_and_decoding() {
        let request = TestRequest::get("/v1/items?q=a%20b&q=second&flag&name=x+y")
            .build()
            .unwrap();
        assert_eq!(request.find_query("q").as_deref(), Some("a b"));
        assert_eq!(request.find_query("flag").as_deref(), Some(""));
        assert_eq!(request.find_query("name").as_deref(), Some("x y"));
    }

    #[test]
    fn test_duplicate_headers_first_wins() {
        let request = TestRequest::get("/")
            .header("X-Foo", "a")
            .header("X-Foo", "b")
            .build()
            .unwrap();
        assert_eq!(request.find_header("X-Foo").as_deref(), Some("a"));
        assert_eq!(request.find_header("x-foo").as_deref(), Some("a"));
    }

    #[test]
    fn test_paths() {
        let request = TestRequest::post("/v1/items/42?api_key=K1").build().unwrap();
        assert_eq!(request.http_method(), "POST");
        assert_eq!(request.path(), "/v1/items/42");
        assert_eq!(request.unparsed_path(), "/v1/items/42?api_key=K1");
    }

    #[test]
    fn test_defaults_and_overrides() {
        let request = TestRequest::get("/").build().unwrap();
        assert_eq!(request.client_ip(), "127.0.0.1");
        assert_eq!(request.protocol(), Protocol::Http);

        let request = TestRequest::get("/")
            .client_ip("10.0.0.7")
            .protocol(Protocol::Grpc)
            .build()
            .unwrap();
        assert_eq!(request.client_ip(), "10.0.0.7");
        assert_eq!(request.protocol(), Protocol::Grpc);
    }

    #[test]
    fn test_invalid_header_reported_on_build() {
        let result = TestRequest::get("/").header("bad header", "x").build();
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }

    #[test]
    fn test_invalid_method_reported_on_build() {
        let result = TestRequestBuilder::with_method("GE T", "/").build();
        assert!(matches!(result, Err(TestError::InvalidMethod(_))));
    }

    #[test]
    fn test_auth_writes() {
        let mut request = TestRequest::get("/").build().unwrap();
        request.set_auth_token("token-1");
        request.set_user_info(UserInfo {
            id: "alice".to_string(),
            ..UserInfo::default()
        });

        assert_eq!(request.auth_state().auth_token(), Some("token-1"));
        assert_eq!(
            request.auth_state().user_info().map(|u| u.id.as_str()),
            Some("alice")
        );
    }
}
