use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use super::defaults::DEFAULT_LISTEN;
use super::parsers::{parse_bool_env, parse_duration_arg, parse_listen_addr, parse_positive_usize};
use super::types::PositiveUsize;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "ndt7 download subtest server: streams random payload over a websocket and reports throughput measurements, stopping early once BBR's bandwidth estimate plateaus."
)]
pub struct ServerArgs {
    /// Address to accept connections on
    #[arg(long, short = 'l', default_value = DEFAULT_LISTEN, value_parser = parse_listen_addr)]
    pub listen: SocketAddr,

    /// Path to config file (TOML/JSON). Defaults to ./ndt7-server.toml or ./ndt7-server.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Interval between measurement messages, at least 250ms (supports ms/s/m/h)
    #[arg(long = "measurement-interval", default_value = "250ms", value_parser = parse_duration_arg)]
    pub measurement_interval: Duration,

    /// Deadline for every single websocket write (supports ms/s/m/h)
    #[arg(long = "write-timeout", default_value = "7s", value_parser = parse_duration_arg)]
    pub write_timeout: Duration,

    /// Maximum number of sessions served at once
    #[arg(long = "max-connections", default_value = "1024", value_parser = parse_positive_usize)]
    pub max_connections: PositiveUsize,

    /// Keep sending for the whole duration even after bandwidth stops growing
    #[arg(long = "no-early-stop")]
    pub no_early_stop: bool,

    /// Leave the socket's congestion control alone instead of switching to BBR
    #[arg(long = "no-bbr")]
    pub no_bbr: bool,

    /// Enable verbose logging (sets log level to debug unless overridden by NDT7_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}
