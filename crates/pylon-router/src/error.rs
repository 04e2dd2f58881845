//! Routing table construction errors.

use thiserror::Error;

/// Errors raised while building a [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The same method was registered twice for one template.
    #[error("duplicate route: {method} {template}")]
    DuplicateRoute {
        /// HTTP method (or `*`).
        method: String,
        /// The path template.
        template: String,
    },

    /// The template could not be parsed.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate {
        /// The path template.
        template: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl RouterError {
    pub(crate) fn invalid(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}
