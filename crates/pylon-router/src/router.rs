//! The routing table.

use http::Method;

use crate::bindings::Bindings;
use crate::error::RouterError;
use crate::node::{parse_template, Node};
use crate::RouteMatch;

/// A routing table from (HTTP method, path) to registered values.
///
/// # Example
///
/// ```rust
/// use pylon_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(&Method::GET, "/v1/shelves/{shelf}/books/{book}", "books.get").unwrap();
/// router.insert_any("/v1/files/*path", "files.any").unwrap();
///
/// let found = router.lookup(&Method::GET, "/v1/shelves/3/books/9").unwrap();
/// assert_eq!(found.bindings.get("shelf"), Some("3"));
///
/// let found = router.lookup(&Method::PUT, "/v1/files/a/b.txt").unwrap();
/// assert_eq!(*found.value, "files.any");
/// assert_eq!(found.bindings.get("path"), Some("a/b.txt"));
/// ```
///
/// # Priority
///
/// Literal segments are tried before variables, and variables before the
/// trailing catch-all, so `/v1/items:batch` beats `/v1/{item}`.
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` for `method` on `template`.
    pub fn insert(&mut self, method: &Method, template: &str, value: T) -> Result<(), RouterError> {
        let segments = parse_template(template)?;
        let table = self.root.table_mut(&segments, template)?;
        if !table.set(method.clone(), value) {
            return Err(RouterError::DuplicateRoute {
                method: method.to_string(),
                template: template.to_string(),
            });
        }
        self.route_count += 1;
        Ok(())
    }

    /// Registers `value` for every method on `template` that has no explicit entry.
    pub fn insert_any(&mut self, template: &str, value: T) -> Result<(), RouterError> {
        let segments = parse_template(template)?;
        let table = self.root.table_mut(&segments, template)?;
        if !table.set_any(value) {
            return Err(RouterError::DuplicateRoute {
                method: "*".to_string(),
                template: template.to_string(),
            });
        }
        self.route_count += 1;
        Ok(())
    }

    /// Resolves a call. Anything after `?` in `path` is ignored.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let segments = split_path(path);
        let mut bindings = Bindings::new();
        let table = self.root.find(&segments, &mut bindings)?;
        let value = table.get(method)?;
        Some(RouteMatch::new(value, bindings))
    }

    /// Lists the methods registered for the template matching `path`.
    ///
    /// Empty when no template matches; useful for answering 405 vs 404.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<&str> {
        let segments = split_path(path);
        let mut bindings = Bindings::new();
        self.root
            .find(&segments, &mut bindings)
            .map(|table| table.methods())
            .unwrap_or_default()
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_literal_beats_variable() {
        let mut router = Router::new();
        router.insert(&Method::GET, "/v1/items/{id}", "items.get").unwrap();
        router.insert(&Method::GET, "/v1/items/count", "items.count").unwrap();

        assert_eq!(*router.lookup(&Method::GET, "/v1/items/count").unwrap().value, "items.count");
        assert_eq!(*router.lookup(&Method::GET, "/v1/items/7").unwrap().value, "items.get");
    }

    #[test]
    fn test_query_string_and_trailing_slash_ignored() {
        let mut router = Router::new();
        router.insert(&Method::GET, "/v1/items", "items.list").unwrap();

        assert!(router.lookup(&Method::GET, "/v1/items/").is_some());
        assert!(router.lookup(&Method::GET, "/v1/items?key=abc").is_some());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router.insert(&Method::POST, "/v1/items", 1).unwrap();
        let err = router.insert(&Method::POST, "/v1/items", 2).unwrap_err();
        assert_eq!(
            err,
            RouterError::DuplicateRoute {
                method: "POST".to_string(),
                template: "/v1/items".to_string(),
            }
        );
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_conflicting_variable_names_rejected() {
        let mut router = Router::new();
        router.insert(&Method::GET, "/v1/items/{id}", 1).unwrap();
        assert!(router.insert(&Method::DELETE, "/v1/items/{name}", 2).is_err());
    }

    #[test]
    fn test_allowed_methods() {
        let mut router = Router::new();
        router.insert(&Method::GET, "/v1/items", 1).unwrap();
        router.insert(&Method::POST, "/v1/items", 2).unwrap();

        assert_eq!(router.allowed_methods("/v1/items"), vec!["GET", "POST"]);
        assert!(router.allowed_methods("/v2/other").is_empty());
    }

    #[test]
    fn test_root_path() {
        let mut router = Router::new();
        router.insert(&Method::GET, "/", "root").unwrap();
        assert_eq!(*router.lookup(&Method::GET, "/").unwrap().value, "root");
    }

    proptest! {
        #[test]
        fn prop_variable_binds_any_segment(segment in "[A-Za-z0-9_.~-]{1,24}") {
            let mut router = Router::new();
            router.insert(&Method::GET, "/v1/items/{id}", ()).unwrap();

            let path = format!("/v1/items/{segment}");
            let found = router.lookup(&Method::GET, &path);
            prop_assert!(found.is_some());
            let found = found.unwrap();
            prop_assert_eq!(found.bindings.get("id"), Some(segment.as_str()));
        }
    }
}
