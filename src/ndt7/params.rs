use std::time::Duration;

use url::form_urlencoded;

use crate::error::ValidationError;

use super::{DEFAULT_DURATION, MAX_DURATION_SECS};

/// Reads the `duration` query parameter of a download request.
///
/// A missing or empty parameter selects the default duration. Anything else
/// must be an integer number of seconds in `0..=30`.
///
/// # Errors
///
/// Returns an error when the value is not an integer or is out of range.
pub fn parse_duration_query(query: Option<&str>) -> Result<Duration, ValidationError> {
    let value = query.and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "duration")
            .map(|(_, value)| value.into_owned())
    });
    match value {
        Some(value) if !value.is_empty() => parse_duration_secs(&value),
        Some(_) | None => Ok(DEFAULT_DURATION),
    }
}

fn parse_duration_secs(value: &str) -> Result<Duration, ValidationError> {
    let secs: i64 = value
        .parse()
        .map_err(|err| ValidationError::InvalidDurationQuery {
            value: value.to_owned(),
            source: err,
        })?;
    match u64::try_from(secs) {
        Ok(secs) if secs <= MAX_DURATION_SECS => Ok(Duration::from_secs(secs)),
        Ok(_) | Err(_) => Err(ValidationError::DurationQueryOutOfRange {
            value: secs,
            max: MAX_DURATION_SECS,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_duration_uses_default() -> Result<(), ValidationError> {
        for query in [None, Some(""), Some("foo=bar"), Some("duration=")] {
            let duration = parse_duration_query(query)?;
            if duration != DEFAULT_DURATION {
                return Err(ValidationError::from(format!(
                    "{:?} yielded {:?}",
                    query, duration
                )));
            }
        }
        Ok(())
    }

    #[test]
    fn accepts_every_value_in_range() -> Result<(), ValidationError> {
        for secs in 0..=MAX_DURATION_SECS {
            let query = format!("duration={}", secs);
            let duration = parse_duration_query(Some(&query))?;
            if duration != Duration::from_secs(secs) {
                return Err(ValidationError::from(format!(
                    "{} yielded {:?}",
                    query, duration
                )));
            }
        }
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_and_malformed_values() -> Result<(), ValidationError> {
        let cases = [
            "duration=-1",
            "duration=31",
            "duration=3600",
            "duration=abc",
            "duration=1.5",
            "duration=5s",
            "duration=%20",
            "duration=99999999999999999999",
        ];
        for query in cases {
            if parse_duration_query(Some(query)).is_ok() {
                return Err(ValidationError::from(format!("{} was accepted", query)));
            }
        }
        Ok(())
    }

    #[test]
    fn first_duration_parameter_wins() -> Result<(), ValidationError> {
        let duration = parse_duration_query(Some("duration=2&duration=abc"))?;
        if duration != Duration::from_secs(2) {
            return Err(ValidationError::from(format!("got {:?}", duration)));
        }
        Ok(())
    }

    #[test]
    fn out_of_range_reports_value() -> Result<(), ValidationError> {
        match parse_duration_query(Some("duration=45")) {
            Err(ValidationError::DurationQueryOutOfRange { value: 45, max: 30 }) => Ok(()),
            Err(err) => Err(ValidationError::from(format!("unexpected error {}", err))),
            Ok(duration) => Err(ValidationError::from(format!("accepted {:?}", duration))),
        }
    }
}
