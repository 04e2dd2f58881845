//! Service context construction errors.

use pylon_config::ConfigError;
use pylon_router::RouterError;
use thiserror::Error;

/// Errors raised while building a [`ServiceContext`](crate::ServiceContext).
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A method's HTTP method is not a valid token.
    #[error("method {selector}: invalid HTTP method '{http_method}'")]
    InvalidHttpMethod {
        /// Selector of the offending method.
        selector: String,
        /// The rejected HTTP method.
        http_method: String,
    },

    /// A method's route could not be registered.
    #[error("method {selector}: {source}")]
    Route {
        /// Selector of the offending method.
        selector: String,
        /// Why the router rejected it.
        #[source]
        source: RouterError,
    },

    /// The service name is empty.
    #[error("service name must not be empty")]
    MissingServiceName,
}
