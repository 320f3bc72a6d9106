//! ndt7 download subtest.
//!
//! The server upgrades `GET /ndt/v7/download` to a websocket, streams one
//! prepared random binary message as fast as the transport allows and sends
//! a JSON measurement every measurement interval. The subtest ends when the
//! requested duration elapses, when the transport's bandwidth estimate stops
//! growing, or on the first failed write.
pub mod bandwidth;
pub mod download;
pub mod handshake;
pub mod measurement;
pub mod params;
pub mod payload;
pub mod replay;
mod transport;

#[cfg(test)]
mod test_support;

use std::time::Duration;

/// Value of the `Sec-WebSocket-Protocol` header negotiated by ndt7.
pub const SEC_WEBSOCKET_PROTOCOL: &str = "net.measurementlab.ndt.v7";

/// URL path of the download subtest.
pub const DOWNLOAD_URL_PATH: &str = "/ndt/v7/download";

/// Largest message the server accepts from a client.
pub const MIN_MAX_MESSAGE_SIZE: usize = 1 << 17;

/// Interval between measurement messages.
pub const MIN_MEASUREMENT_INTERVAL: Duration = Duration::from_millis(250);

/// Deadline applied to every single write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// Duration used when the client does not ask for one.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

/// Longest duration a client may ask for, in seconds.
pub const MAX_DURATION_SECS: u64 = 30;

/// Size of every binary message.
pub const BUFFER_SIZE: usize = 1 << 13;
