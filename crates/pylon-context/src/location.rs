//! Best-effort location tags for Reports.

/// Maps a caller address to a location tag such as a region or zone.
///
/// Returning `None` is normal; the Report then falls back to the
/// configured platform zone, or leaves the location empty.
///
/// Any `Fn(&str) -> Option<String>` closure is a resolver:
///
/// ```
/// use pylon_context::LocationResolver;
///
/// let resolver = |ip: &str| ip.starts_with("10.").then(|| "internal".to_string());
/// assert_eq!(resolver.resolve("10.1.2.3").as_deref(), Some("internal"));
/// assert_eq!(resolver.resolve("8.8.8.8"), None);
/// ```
pub trait LocationResolver: Send + Sync {
    /// Returns the location tag for `client_ip`, if known.
    fn resolve(&self, client_ip: &str) -> Option<String>;
}

impl<F> LocationResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, client_ip: &str) -> Option<String> {
        self(client_ip)
    }
}
