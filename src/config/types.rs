use serde::Deserialize;
use std::time::Duration;

use crate::args::parsers::parse_duration_arg;
use crate::error::ValidationError;

/// Server settings read from `ndt7-server.toml` or `ndt7-server.json`.
/// Every field is optional; command-line flags win over file values.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub listen: Option<String>,
    pub measurement_interval: Option<DurationValue>,
    pub write_timeout: Option<DurationValue>,
    pub max_connections: Option<usize>,
    pub early_stop: Option<bool>,
    pub enable_bbr: Option<bool>,
}

/// Either a number of seconds or a string such as `"250ms"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => parse_duration_arg(text),
        }
    }
}
