//! Per-request span tree and W3C trace context.
//!
//! The root `pylon.request` span opens when the request context is built
//! and closes when it is dropped. Child spans cover key extraction
//! (`pylon.extract_api_key`), the Check round trip (`pylon.check`) and
//! Report filling (`pylon.report`).

use pylon_control::TraceContextInfo;
use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

/// The W3C Trace Context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// A parsed `traceparent` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceParent {
    /// 128-bit trace id, 32 lowercase hex chars.
    pub trace_id: String,
    /// Span id of the upstream caller, 16 hex chars.
    pub parent_span_id: String,
    /// Trace flags.
    pub flags: TraceFlags,
}

impl TraceParent {
    /// Parses `{version}-{trace-id}-{parent-span-id}-{flags}`.
    ///
    /// Only version `00` is accepted. All-zero ids are invalid.
    ///
    /// ```
    /// use pylon_context::TraceParent;
    ///
    /// let parent = TraceParent::parse("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").unwrap();
    /// assert!(parent.flags.is_sampled());
    /// assert!(TraceParent::parse("garbage").is_none());
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        let [version, trace_id, parent_span_id, flags] = parts.as_slice() else {
            return None;
        };

        if *version != "00" {
            return None;
        }
        if !is_hex_id(trace_id, 32) || !is_hex_id(parent_span_id, 16) {
            return None;
        }
        if flags.len() != 2 || !flags.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_span_id: parent_span_id.to_ascii_lowercase(),
            flags: TraceFlags(flags),
        })
    }
}

fn is_hex_id(value: &str, len: usize) -> bool {
    value.len() == len
        && value.chars().all(|c| c.is_ascii_hexdigit())
        && value.chars().any(|c| c != '0')
}

/// Trace flags from the W3C Trace Context header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flags set.
    pub const NONE: Self = Self(0x00);
    /// The trace is sampled.
    pub const SAMPLED: Self = Self(0x01);

    /// Returns true if the sampled flag is set.
    #[must_use]
    pub const fn is_sampled(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// Identity of one request inside its distributed trace.
#[derive(Debug, Clone)]
struct TraceIds {
    trace_id: String,
    span_id: String,
    check_span_id: String,
    parent_span_id: Option<String>,
    sampled: bool,
}

fn new_span_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

impl TraceIds {
    fn new(parent: Option<TraceParent>) -> Self {
        let span_id = new_span_id();
        let check_span_id = new_span_id();
        match parent {
            Some(parent) => Self {
                trace_id: parent.trace_id,
                span_id,
                check_span_id,
                parent_span_id: Some(parent.parent_span_id),
                sampled: parent.flags.is_sampled(),
            },
            None => Self {
                trace_id: Uuid::new_v4().simple().to_string(),
                span_id,
                check_span_id,
                parent_span_id: None,
                sampled: true,
            },
        }
    }
}

/// The span tree owned by one request context.
#[derive(Debug)]
pub struct RequestTrace {
    root: Span,
    check: Option<Span>,
    report: Option<Span>,
    ids: TraceIds,
}

impl RequestTrace {
    /// Opens the root span.
    ///
    /// `traceparent` is the raw inbound header, if any; an unparseable value
    /// starts a fresh trace.
    #[must_use]
    pub fn new(
        operation_id: &str,
        selector: &str,
        http_method: &str,
        path: &str,
        traceparent: Option<&str>,
    ) -> Self {
        let ids = TraceIds::new(traceparent.and_then(TraceParent::parse));
        let root = tracing::info_span!(
            "pylon.request",
            operation_id = %operation_id,
            selector = %selector,
            http.method = %http_method,
            http.path = %path,
            trace_id = %ids.trace_id,
            parent_span_id = ids.parent_span_id.as_deref().unwrap_or(""),
            state = Empty,
            status = Empty,
        );

        Self {
            root,
            check: None,
            report: None,
            ids,
        }
    }

    /// The root `pylon.request` span.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.root
    }

    /// Runs `f` inside a `pylon.extract_api_key` child span.
    pub fn in_extract_span<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::debug_span!(parent: &self.root, "pylon.extract_api_key").in_scope(f)
    }

    /// Opens the `pylon.check` child span.
    pub fn start_check(&mut self) {
        if self.check.is_none() {
            self.check = Some(tracing::info_span!(
                parent: &self.root,
                "pylon.check",
                span_id = %self.ids.check_span_id,
                status = Empty
            ));
        }
    }

    /// Records the Check outcome and closes the `pylon.check` span.
    pub fn finish_check(&mut self, status: &str) {
        if let Some(span) = self.check.take() {
            span.record("status", status);
        }
        self.root.record("status", status);
    }

    /// Opens the `pylon.report` child span; it closes when the trace is dropped.
    pub fn start_report(&mut self, response_code: u16) {
        if self.report.is_none() {
            self.report = Some(tracing::info_span!(
                parent: &self.root,
                "pylon.report",
                http.status_code = response_code
            ));
        }
    }

    /// Records the current lifecycle state on the root span.
    pub fn record_state(&self, state: &str) {
        self.root.record("state", state);
    }

    /// Trace id of the request.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.ids.trace_id
    }

    /// Span id assigned to this request.
    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.ids.span_id
    }

    /// Span id of the Check call, a child of [`RequestTrace::span_id`].
    #[must_use]
    pub fn check_span_id(&self) -> &str {
        &self.ids.check_span_id
    }

    /// Span id of the upstream caller, when a `traceparent` was received.
    #[must_use]
    pub fn parent_span_id(&self) -> Option<&str> {
        self.ids.parent_span_id.as_deref()
    }

    /// Trace context to propagate on the Check RPC.
    ///
    /// Carries the Check span's own id, fixed for the life of the request.
    #[must_use]
    pub fn trace_context(&self) -> TraceContextInfo {
        TraceContextInfo {
            trace_id: self.ids.trace_id.clone(),
            span_id: self.ids.check_span_id.clone(),
            sampled: self.ids.sampled,
        }
    }
}
