//! Log output for the gateway process.
//!
//! Every request context opens a `pylon.request` span carrying the operation
//! id and selector; log lines emitted inside it inherit those fields. JSON
//! output puts them under `span`, pretty output prints the span when it closes.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// One JSON object per line, for log collectors.
    #[default]
    Json,
    /// Multi-line human-readable output with span timings.
    Pretty,
}

/// Log subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Install a subscriber at all.
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info,pylon_context=debug`.
    pub filter: String,
    /// Line encoding.
    pub output: LogOutput,
    /// Include file and line.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "info".to_string(),
            output: LogOutput::Json,
            include_location: false,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

impl LogConfig {
    fn layer(&self) -> TelemetryResult<BoxedLayer> {
        let filter = EnvFilter::try_new(&self.filter).map_err(|e| {
            TelemetryError::Logging(format!("bad filter {:?}: {e}", self.filter))
        })?;
        let base = tracing_subscriber::fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location);

        let layer = match self.output {
            LogOutput::Json => base
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_filter(filter)
                .boxed(),
            LogOutput::Pretty => base
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(filter)
                .boxed(),
        };
        Ok(layer)
    }
}

/// Installs the global log subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::Logging` if the filter does not parse or a
/// global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(config.layer()?)
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))
}
