use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::parsers::parse_listen_addr;
use crate::args::{PositiveUsize, ServerArgs};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments. Values given on the
/// command line are kept.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(
    args: &mut ServerArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "listen")
        && let Some(listen) = config.listen.as_deref()
    {
        args.listen = parse_listen_addr(listen)?;
    }

    if !is_cli(matches, "measurement_interval")
        && let Some(interval) = config.measurement_interval.as_ref()
    {
        args.measurement_interval = interval.to_duration().map_err(|err| {
            AppError::config(ConfigError::InvalidDuration {
                field: "measurement_interval",
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "write_timeout")
        && let Some(timeout) = config.write_timeout.as_ref()
    {
        args.write_timeout = timeout.to_duration().map_err(|err| {
            AppError::config(ConfigError::InvalidDuration {
                field: "write_timeout",
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "max_connections")
        && let Some(max_connections) = config.max_connections
    {
        args.max_connections = ensure_positive_usize(max_connections, "max_connections")?;
    }

    if !is_cli(matches, "no_early_stop")
        && let Some(early_stop) = config.early_stop
    {
        args.no_early_stop = !early_stop;
    }

    if !is_cli(matches, "no_bbr")
        && let Some(enable_bbr) = config.enable_bbr
    {
        args.no_bbr = !enable_bbr;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_usize(value: usize, field: &'static str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive { field, source: err })
    })
}
