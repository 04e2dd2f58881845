//! Variable bindings captured while matching a path template.

use smallvec::SmallVec;

/// Bindings stored inline before spilling to the heap.
const INLINE_BINDINGS: usize = 4;

/// Variables bound by a route match, in template order.
///
/// Most API paths carry one or two variables, so storage is a small vector
/// rather than a map.
///
/// # Example
///
/// ```rust
/// use pylon_router::Bindings;
///
/// let mut bindings = Bindings::new();
/// bindings.push("shelf", "7");
/// bindings.push("book", "moby-dick");
///
/// assert_eq!(bindings.get("book"), Some("moby-dick"));
/// assert_eq!(bindings.get("author"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bindings {
    inner: SmallVec<[(String, String); INLINE_BINDINGS]>,
}

impl Bindings {
    /// Creates an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a binding.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Drops bindings pushed after `len`, used when a match attempt backtracks.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }
}

impl FromIterator<(String, String)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut bindings = Bindings::new();
        assert!(bindings.is_empty());

        bindings.push("id", "42");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("id"), Some("42"));
    }

    #[test]
    fn test_truncate_restores_earlier_state() {
        let mut bindings = Bindings::new();
        bindings.push("a", "1");
        let mark = bindings.len();
        bindings.push("b", "2");
        bindings.truncate(mark);

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("b"), None);
    }

    #[test]
    fn test_iter_preserves_order() {
        let bindings: Bindings = vec![
            ("x".to_string(), "1".to_string()),
            ("y".to_string(), "2".to_string()),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = bindings.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
