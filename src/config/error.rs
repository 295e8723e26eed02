//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric environment override could not be parsed.
    #[error("failed to parse {name}='{value}' as a number: {source}")]
    NumberParseError {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A float environment override could not be parsed.
    #[error("failed to parse {name}='{value}' as a float: {source}")]
    FloatParseError {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// A URL override is not a valid http(s) endpoint.
    #[error("invalid URL for {name}: '{value}'")]
    InvalidUrl { name: &'static str, value: String },

    /// A value is outside its permitted range.
    #[error("invalid value for {name}: {reason}")]
    OutOfRange {
        name: &'static str,
        reason: String,
    },
}
