//! Failures bringing telemetry up.

use std::net::AddrParseError;

use thiserror::Error;

/// A telemetry subsystem could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Bad filter directive, or a global subscriber is already set.
    #[error("log subscriber not installed: {0}")]
    Logging(String),

    /// The Prometheus recorder or its listener could not be installed.
    #[error("metrics recorder not installed: {0}")]
    Metrics(String),

    /// The scrape listen address does not parse.
    #[error("metrics listen address {addr:?}: {source}")]
    MetricsAddr {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: AddrParseError,
    },

    /// The OTLP exporter could not be built for the collector.
    #[error("span export to {endpoint} not started: {reason}")]
    Export {
        /// Collector endpoint.
        endpoint: String,
        /// Exporter error.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_setting() {
        let source = "nowhere".parse::<std::net::SocketAddr>().unwrap_err();
        let err = TelemetryError::MetricsAddr {
            addr: "nowhere".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("metrics listen address \"nowhere\": "));

        let err = TelemetryError::Export {
            endpoint: "http://collector:4317".to_string(),
            reason: "invalid uri".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "span export to http://collector:4317 not started: invalid uri"
        );
    }
}
