use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{SessionError, SessionStage};
use crate::probe::BandwidthSample;

use super::transport::send_within;

/// Periodic report sent to the client as a JSON text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Time since the session started, in nanoseconds.
    #[serde(rename = "Elapsed")]
    pub elapsed: i64,
    /// Payload bytes sent since the session started.
    #[serde(rename = "NumBytes")]
    pub num_bytes: i64,
    #[serde(rename = "BBRInfo", default, skip_serializing_if = "Option::is_none")]
    pub bbr_info: Option<BbrInfo>,
}

/// Congestion-control diagnostics attached when the kernel provided them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BbrInfo {
    /// Bandwidth estimate in bytes per second.
    #[serde(rename = "MaxBandwidth")]
    pub max_bandwidth: u64,
    /// Round-trip-time estimate in microseconds.
    #[serde(rename = "MinRTT")]
    pub min_rtt: u64,
}

impl From<BandwidthSample> for BbrInfo {
    fn from(sample: BandwidthSample) -> Self {
        Self {
            max_bandwidth: sample.bandwidth,
            min_rtt: sample.rtt_micros,
        }
    }
}

impl Measurement {
    #[must_use]
    pub fn new(elapsed: Duration, num_bytes: u64) -> Self {
        Self {
            elapsed: i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX),
            num_bytes: i64::try_from(num_bytes).unwrap_or(i64::MAX),
            bbr_info: None,
        }
    }

    #[must_use]
    pub fn with_sample(mut self, sample: Option<BandwidthSample>) -> Self {
        self.bbr_info = sample.map(BbrInfo::from);
        self
    }
}

/// Writes measurements to the client, each under its own deadline.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementEmitter {
    write_timeout: Duration,
}

impl MeasurementEmitter {
    #[must_use]
    pub const fn new(write_timeout: Duration) -> Self {
        Self { write_timeout }
    }

    /// Serializes `measurement` and sends it as a text message.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails, when the transport fails or
    /// when the write does not complete before the deadline.
    pub async fn emit<S>(
        &self,
        websocket: &mut WebSocketStream<S>,
        measurement: &Measurement,
    ) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let payload = serde_json::to_string(measurement)
            .map_err(|err| SessionError::Serialize { source: err })?;
        send_within(
            websocket,
            Message::text(payload),
            self.write_timeout,
            SessionStage::Measurement,
        )
        .await
    }
}
