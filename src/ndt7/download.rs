use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

use crate::error::{SessionError, SessionStage};
use crate::probe::CongestionProbe;

use super::bandwidth::BandwidthMonitor;
use super::measurement::{Measurement, MeasurementEmitter};
use super::payload::PreparedPayload;
use super::transport::send_within;
use super::{DEFAULT_TIMEOUT, MIN_MEASUREMENT_INTERVAL};

/// Knobs of a single download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub measurement_interval: Duration,
    pub write_timeout: Duration,
    pub early_stop: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            measurement_interval: MIN_MEASUREMENT_INTERVAL,
            write_timeout: DEFAULT_TIMEOUT,
            early_stop: true,
        }
    }
}

/// Why the sending phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    BandwidthPlateau,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StopReason::DurationElapsed => "duration elapsed",
            StopReason::BandwidthPlateau => "bandwidth plateau",
        }
    }
}

/// Outcome of a download session that ended with a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub elapsed: Duration,
    pub num_bytes: u64,
    pub measurements: u64,
    pub stop_reason: StopReason,
}

impl SessionSummary {
    /// Average payload throughput in hundredths of a Mbit/s.
    #[must_use]
    pub fn centi_mbps(&self) -> u64 {
        // bytes * 8 bits / micros = Mbit/s
        let micros = self.elapsed.as_micros();
        let centi_bits = u128::from(self.num_bytes).saturating_mul(800);
        centi_bits
            .checked_div(micros)
            .map_or(0, |value| u64::try_from(value).unwrap_or(u64::MAX))
    }

    #[must_use]
    pub fn throughput_label(&self) -> String {
        let centi = self.centi_mbps();
        format!("{}.{:02} Mbit/s", centi / 100, centi % 100)
    }
}

/// Measurement clock polled without waiting.
///
/// The next tick is scheduled one interval after the tick that was actually
/// served, so ticks missed during a blocked write collapse into one and two
/// measurements are never closer than the interval.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TickSchedule {
    next: Instant,
    interval: Duration,
}

impl TickSchedule {
    pub(crate) fn new(start: Instant, interval: Duration) -> Self {
        Self {
            next: start.checked_add(interval).unwrap_or(start),
            interval,
        }
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    pub(crate) fn advance(&mut self, now: Instant) {
        self.next = now.checked_add(self.interval).unwrap_or(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Sending,
    Tick,
    Done(StopReason),
}

/// One download subtest over an upgraded websocket.
pub struct DownloadSession<S, P>
where
    P: CongestionProbe,
{
    websocket: WebSocketStream<S>,
    monitor: BandwidthMonitor<P>,
    payload: PreparedPayload,
    duration: Duration,
    settings: SessionSettings,
}

impl<S, P> DownloadSession<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: CongestionProbe,
{
    pub const fn new(
        websocket: WebSocketStream<S>,
        monitor: BandwidthMonitor<P>,
        payload: PreparedPayload,
        duration: Duration,
        settings: SessionSettings,
    ) -> Self {
        Self {
            websocket,
            monitor,
            payload,
            duration,
            settings,
        }
    }

    /// Streams payload and measurements until the duration elapses or the
    /// bandwidth plateaus, then sends a normal close frame.
    ///
    /// The websocket and the probe handle are dropped on return, on success
    /// and on failure alike.
    ///
    /// # Errors
    ///
    /// Returns the first failed or timed-out write. No close frame is sent in
    /// that case.
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let start = Instant::now();
        let emitter = MeasurementEmitter::new(self.settings.write_timeout);
        let mut schedule = TickSchedule::new(start, self.settings.measurement_interval);
        let mut num_bytes: u64 = 0;
        let mut measurements: u64 = 0;
        let frame_len = u64::try_from(self.payload.len()).unwrap_or(u64::MAX);
        let mut state = LoopState::Sending;

        let stop_reason = loop {
            match state {
                LoopState::Sending => {
                    let now = Instant::now();
                    if schedule.is_due(now) {
                        state = LoopState::Tick;
                    } else if now.saturating_duration_since(start) >= self.duration {
                        state = LoopState::Done(StopReason::DurationElapsed);
                    } else {
                        send_within(
                            &mut self.websocket,
                            self.payload.frame(),
                            self.settings.write_timeout,
                            SessionStage::Data,
                        )
                        .await?;
                        num_bytes = num_bytes.saturating_add(frame_len);
                    }
                }
                LoopState::Tick => {
                    let now = Instant::now();
                    schedule.advance(now);
                    let observation = self.monitor.observe();
                    let measurement =
                        Measurement::new(now.saturating_duration_since(start), num_bytes)
                            .with_sample(observation.sample);
                    emitter.emit(&mut self.websocket, &measurement).await?;
                    measurements = measurements.saturating_add(1);
                    state = if observation.stop {
                        LoopState::Done(StopReason::BandwidthPlateau)
                    } else {
                        LoopState::Sending
                    };
                }
                LoopState::Done(reason) => break reason,
            }
        };

        let elapsed = start.elapsed();
        debug!(
            "Download stopped after {:?}: {}",
            elapsed,
            stop_reason.as_str()
        );
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        send_within(
            &mut self.websocket,
            close,
            self.settings.write_timeout,
            SessionStage::Close,
        )
        .await?;

        Ok(SessionSummary {
            elapsed,
            num_bytes,
            measurements,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests;
