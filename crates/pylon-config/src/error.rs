//! Errors raised while assembling a gateway configuration.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Syntax of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl Format {
    /// Maps a file extension or format name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for anything but `toml` or `json`.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(name.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

/// Where a configuration document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A file on disk.
    File(PathBuf),
    /// A string handed to [`crate::ConfigLoader::with_string`].
    Inline,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline => f.write_str("<inline>"),
        }
    }
}

/// Reasons a gateway configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("gateway configuration {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read gateway configuration {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is malformed or carries fields the gateway does not know.
    #[error("{format} configuration {origin} rejected: {message}")]
    Parse {
        /// Where the document came from.
        origin: Origin,
        /// Its syntax.
        format: Format,
        /// Parser message, including line and column where the parser gives them.
        message: String,
    },

    /// A loaded value fails validation.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path, e.g. `methods[0].path`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `PREFIX__SECTION__KEY` override did not parse.
    #[error("{var} overrides {field}: {reason}")]
    EnvOverride {
        /// The variable name as set.
        var: String,
        /// Dotted path of the setting it targets.
        field: String,
        /// What was expected.
        reason: String,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format {0:?}, expected toml or json")]
    UnsupportedFormat(String),
}

impl ConfigError {
    pub(crate) fn parse(origin: Origin, format: Format, message: impl fmt::Display) -> Self {
        Self::Parse {
            origin,
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env_override(
        var: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::EnvOverride {
            var: var.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the setting at fault, when the error names one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } | Self::EnvOverride { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(Format::from_name("TOML").unwrap(), Format::Toml);
        assert_eq!(Format::from_name("json").unwrap(), Format::Json);
        assert!(matches!(
            Format::from_name("yaml"),
            Err(ConfigError::UnsupportedFormat(name)) if name == "yaml"
        ));
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = ConfigError::parse(
            Origin::File(PathBuf::from("/etc/pylon/gateway.toml")),
            Format::Toml,
            "unknown field `sevice`",
        );
        assert_eq!(
            err.to_string(),
            "TOML configuration /etc/pylon/gateway.toml rejected: unknown field `sevice`"
        );
        assert_eq!(err.field(), None);

        let err = ConfigError::parse(Origin::Inline, Format::Json, "EOF");
        assert!(err.to_string().contains("<inline>"));
    }

    #[test]
    fn test_field_of_value_errors() {
        let err = ConfigError::invalid_value("control.check_timeout_ms", "must be positive");
        assert_eq!(err.field(), Some("control.check_timeout_ms"));
        assert_eq!(err.to_string(), "control.check_timeout_ms: must be positive");

        let err = ConfigError::env_override(
            "PYLON__CONTROL__REPORT_ENABLED",
            "control.report_enabled",
            "expected boolean",
        );
        assert_eq!(err.field(), Some("control.report_enabled"));
        assert_eq!(
            err.to_string(),
            "PYLON__CONTROL__REPORT_ENABLED overrides control.report_enabled: expected boolean"
        );
    }
}
