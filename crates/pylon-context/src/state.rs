//! Lifecycle of one request context.

use std::fmt;

/// Where a [`RequestContext`](crate::RequestContext) is in its lifecycle.
///
/// States only move forward, in declaration order. [`RequestState::Failed`]
/// can be reached from any non-terminal state and skips the Report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestState {
    /// Routing resolved the method; only identity is populated.
    Created,
    /// The API key lookup ran (whether or not a key was found).
    KeyExtracted,
    /// The Check request left for the control plane.
    CheckDispatched,
    /// The Check outcome is recorded and the continuation has fired.
    CheckCompleted,
    /// The Report request info was filled.
    ReportFilled,
    /// All work for the call is finished.
    Done,
    /// The call was abandoned.
    Failed,
}

impl RequestState {
    /// Stable lowercase name, used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::KeyExtracted => "key_extracted",
            Self::CheckDispatched => "check_dispatched",
            Self::CheckCompleted => "check_completed",
            Self::ReportFilled => "report_filled",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// True for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// True when `next` is reachable from `self` in one move.
    ///
    /// Skipping ahead is allowed (a local pre-check completes Check without
    /// dispatching it, unreported methods go straight to `Done`); going back
    /// or staying put is not.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || next > self
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RequestState; 7] = [
        RequestState::Created,
        RequestState::KeyExtracted,
        RequestState::CheckDispatched,
        RequestState::CheckCompleted,
        RequestState::ReportFilled,
        RequestState::Done,
        RequestState::Failed,
    ];

    #[test]
    fn test_forward_only() {
        assert!(RequestState::Created.can_advance_to(RequestState::KeyExtracted));
        assert!(RequestState::KeyExtracted.can_advance_to(RequestState::CheckCompleted));
        assert!(!RequestState::CheckCompleted.can_advance_to(RequestState::CheckDispatched));
        assert!(!RequestState::KeyExtracted.can_advance_to(RequestState::KeyExtracted));
    }

    #[test]
    fn test_failed_reachable_from_every_live_state() {
        for state in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_advance_to(RequestState::Failed), "{state}");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [RequestState::Done, RequestState::Failed] {
            for to in ALL {
                assert!(!from.can_advance_to(to));
            }
        }
    }
}
