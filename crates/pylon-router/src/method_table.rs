//! Per-template HTTP method dispatch.

use http::Method;

/// Values registered for one path template, keyed by HTTP method.
///
/// A value registered with [`MethodTable::set_any`] answers every method
/// that has no explicit entry.
///
/// # Example
///
/// ```rust
/// use pylon_router::MethodTable;
/// use http::Method;
///
/// let mut table = MethodTable::new();
/// assert!(table.set(Method::GET, "items.get"));
/// assert!(table.set_any("items.fallback"));
///
/// assert_eq!(table.get(&Method::GET), Some(&"items.get"));
/// assert_eq!(table.get(&Method::PATCH), Some(&"items.fallback"));
/// ```
#[derive(Debug, Clone)]
pub struct MethodTable<T> {
    entries: Vec<(Method, T)>,
    any: Option<T>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            any: None,
        }
    }
}

impl<T> MethodTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`. Returns false if the method was taken.
    pub fn set(&mut self, method: Method, value: T) -> bool {
        if self.entries.iter().any(|(m, _)| *m == method) {
            return false;
        }
        self.entries.push((method, value));
        true
    }

    /// Registers the any-method fallback. Returns false if already set.
    pub fn set_any(&mut self, value: T) -> bool {
        if self.any.is_some() {
            return false;
        }
        self.any = Some(value);
        true
    }

    /// Returns the value for `method`, falling back to the any-method entry.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
            .or(self.any.as_ref())
    }

    /// Lists the explicitly registered methods, `*` last if a fallback exists.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.entries.iter().map(|(m, _)| m.as_str()).collect();
        if self.any.is_some() {
            methods.push("*");
        }
        methods
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.any.is_none()
    }
}
