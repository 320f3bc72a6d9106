use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("The duration option has an invalid value '{value}': {source}")]
    InvalidDurationQuery {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("The duration option must be between 0 and {max} seconds, got {value}.")]
    DurationQueryOutOfRange { value: i64, max: u64 },
    #[error("Missing Sec-WebSocket-Protocol '{expected}' in request.")]
    MissingSubprotocol { expected: &'static str },
    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },
    #[error("No subtest is served at '{path}'.")]
    UnknownPath { path: String },
    #[error("Invalid boolean '{value}'. Expected true/false, yes/no, on/off, or 1/0.")]
    InvalidBoolean { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid listen address '{value}': {source}")]
    InvalidListenAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("Measurement interval must be at least {min:?}, got {value:?}.")]
    MeasurementIntervalTooShort { value: Duration, min: Duration },
    #[error("Value {value} is too large for {field}.")]
    ValueTooLarge { field: &'static str, value: usize },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
