use std::future::Future;

use futures_util::StreamExt;
use tokio::io::DuplexStream;
use tokio_tungstenite::tungstenite::protocol::Role;

use super::*;
use crate::error::{AppError, AppResult};
use crate::ndt7::measurement::BbrInfo;
use crate::ndt7::test_support::ScriptedProbe;
use crate::probe::DisabledProbe;

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::session(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

fn settings(interval_ms: u64, timeout_ms: u64, early_stop: bool) -> SessionSettings {
    SessionSettings {
        measurement_interval: Duration::from_millis(interval_ms),
        write_timeout: Duration::from_millis(timeout_ms),
        early_stop,
    }
}

async fn session_pair<P>(
    monitor: BandwidthMonitor<P>,
    duration: Duration,
    settings: SessionSettings,
    buffer: usize,
) -> AppResult<(
    DownloadSession<DuplexStream, P>,
    WebSocketStream<DuplexStream>,
)>
where
    P: CongestionProbe,
{
    let (server_io, client_io) = tokio::io::duplex(buffer);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let payload = PreparedPayload::generate()?;
    Ok((
        DownloadSession::new(server, monitor, payload, duration, settings),
        client,
    ))
}

/// What a client observed, in arrival order.
#[derive(Debug, Default)]
struct Transcript {
    binary_bytes: u64,
    measurements: Vec<Measurement>,
    bytes_before_measurement: Vec<u64>,
    close: Option<CloseFrame>,
}

async fn drain(mut client: WebSocketStream<DuplexStream>) -> AppResult<Transcript> {
    let mut transcript = Transcript::default();
    while let Some(message) = client.next().await {
        let message =
            message.map_err(|err| AppError::session(format!("Client read failed: {}", err)))?;
        match message {
            Message::Binary(data) => {
                let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
                transcript.binary_bytes = transcript.binary_bytes.saturating_add(len);
            }
            Message::Text(text) => {
                let measurement: Measurement = serde_json::from_str(text.as_str())?;
                transcript.measurements.push(measurement);
                transcript
                    .bytes_before_measurement
                    .push(transcript.binary_bytes);
            }
            Message::Close(frame) => {
                transcript.close = frame;
                break;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    Ok(transcript)
}

fn expect_normal_close(transcript: &Transcript) -> AppResult<()> {
    match transcript.close.as_ref() {
        Some(frame) if frame.code == CloseCode::Normal && frame.reason.is_empty() => Ok(()),
        other => Err(AppError::session(format!(
            "Expected normal close, got {:?}",
            other
        ))),
    }
}

#[test]
fn runs_for_duration_without_probe() -> AppResult<()> {
    run_async_test(async {
        let duration = Duration::from_millis(600);
        let interval = Duration::from_millis(100);
        let monitor = BandwidthMonitor::new(DisabledProbe, None, true);
        let (session, client) =
            session_pair(monitor, duration, settings(100, 2_000, true), 64 * 1024).await?;
        let (summary, transcript) = tokio::join!(session.run(), drain(client));
        let summary = summary?;
        let transcript = transcript?;

        if summary.stop_reason != StopReason::DurationElapsed {
            return Err(AppError::session(format!("stopped by {:?}", summary.stop_reason)));
        }
        let deadline = duration.saturating_add(interval.saturating_mul(2));
        if summary.elapsed < duration || summary.elapsed > deadline {
            return Err(AppError::session(format!("elapsed {:?}", summary.elapsed)));
        }
        if !(3..=7).contains(&transcript.measurements.len()) {
            return Err(AppError::session(format!(
                "Unexpected measurement count {}",
                transcript.measurements.len()
            )));
        }
        if summary.measurements != u64::try_from(transcript.measurements.len()).unwrap_or(0) {
            return Err(AppError::session("Summary and client disagree on measurements"));
        }
        if summary.num_bytes != transcript.binary_bytes || summary.num_bytes == 0 {
            return Err(AppError::session(format!(
                "Summary counted {} bytes, client read {}",
                summary.num_bytes, transcript.binary_bytes
            )));
        }
        if summary.num_bytes % 8192 != 0 {
            return Err(AppError::session("Byte count is not a multiple of the frame size"));
        }
        expect_normal_close(&transcript)?;
        Ok(())
    })
}

#[test]
fn measurements_report_bytes_sent_before_them() -> AppResult<()> {
    run_async_test(async {
        let interval = Duration::from_millis(50);
        let monitor = BandwidthMonitor::new(DisabledProbe, None, true);
        let (session, client) = session_pair(
            monitor,
            Duration::from_millis(400),
            settings(50, 2_000, true),
            64 * 1024,
        )
        .await?;
        let (summary, transcript) = tokio::join!(session.run(), drain(client));
        summary?;
        let transcript = transcript?;

        let min_gap = i64::try_from(interval.as_nanos()).unwrap_or(i64::MAX);
        let max_gap = min_gap.saturating_mul(2);
        if transcript.measurements.len() < 4 {
            return Err(AppError::session(format!(
                "Only {} measurements in 400ms",
                transcript.measurements.len()
            )));
        }
        if let Some(first) = transcript.measurements.first()
            && first.elapsed > max_gap
        {
            return Err(AppError::session(format!(
                "First measurement after {}ns",
                first.elapsed
            )));
        }
        let mut previous: Option<&Measurement> = None;
        for (measurement, bytes) in transcript
            .measurements
            .iter()
            .zip(transcript.bytes_before_measurement.iter())
        {
            if u64::try_from(measurement.num_bytes).unwrap_or(0) != *bytes {
                return Err(AppError::session(format!(
                    "NumBytes {} but client had read {}",
                    measurement.num_bytes, bytes
                )));
            }
            if measurement.bbr_info.is_some() {
                return Err(AppError::session("Unexpected BBRInfo without probe"));
            }
            if let Some(previous) = previous {
                let gap = measurement.elapsed.saturating_sub(previous.elapsed);
                if gap < min_gap {
                    return Err(AppError::session(format!("Measurements only {}ns apart", gap)));
                }
                if gap > max_gap {
                    return Err(AppError::session(format!("Measurements {}ns apart", gap)));
                }
                if measurement.num_bytes < previous.num_bytes {
                    return Err(AppError::session("NumBytes went backwards"));
                }
            }
            previous = Some(measurement);
        }
        expect_normal_close(&transcript)?;
        Ok(())
    })
}

#[test]
fn stops_when_bandwidth_plateaus() -> AppResult<()> {
    run_async_test(async {
        let monitor =
            BandwidthMonitor::new(ScriptedProbe::bandwidths(&[100, 120, 125]), Some(()), true);
        let (session, client) = session_pair(
            monitor,
            Duration::from_secs(5),
            settings(30, 2_000, true),
            64 * 1024,
        )
        .await?;
        let (summary, transcript) = tokio::join!(session.run(), drain(client));
        let summary = summary?;
        let transcript = transcript?;

        if summary.stop_reason != StopReason::BandwidthPlateau {
            return Err(AppError::session(format!("stopped by {:?}", summary.stop_reason)));
        }
        if summary.elapsed >= Duration::from_secs(5) {
            return Err(AppError::session("Session ran for the full duration"));
        }
        let reported: Vec<Option<BbrInfo>> = transcript
            .measurements
            .iter()
            .map(|measurement| measurement.bbr_info)
            .collect();
        let expected = vec![
            Some(BbrInfo {
                max_bandwidth: 100,
                min_rtt: 1_000,
            }),
            Some(BbrInfo {
                max_bandwidth: 120,
                min_rtt: 1_000,
            }),
        ];
        if reported != expected {
            return Err(AppError::session(format!("reported {:?}", reported)));
        }
        expect_normal_close(&transcript)?;
        Ok(())
    })
}

#[test]
fn early_stop_disabled_runs_full_duration() -> AppResult<()> {
    run_async_test(async {
        let duration = Duration::from_millis(300);
        let monitor = BandwidthMonitor::new(ScriptedProbe::bandwidths(&[100; 32]), Some(()), false);
        let (session, client) =
            session_pair(monitor, duration, settings(50, 2_000, false), 64 * 1024).await?;
        let (summary, transcript) = tokio::join!(session.run(), drain(client));
        let summary = summary?;
        let transcript = transcript?;

        if summary.stop_reason != StopReason::DurationElapsed || summary.elapsed < duration {
            return Err(AppError::session(format!("{:?}", summary)));
        }
        if transcript.measurements.len() < 2
            || transcript
                .measurements
                .iter()
                .any(|measurement| measurement.bbr_info.is_none())
        {
            return Err(AppError::session(format!(
                "Expected sampled measurements, got {:?}",
                transcript.measurements
            )));
        }
        expect_normal_close(&transcript)?;
        Ok(())
    })
}

#[test]
fn zero_duration_closes_immediately() -> AppResult<()> {
    run_async_test(async {
        let monitor = BandwidthMonitor::new(DisabledProbe, None, true);
        let (session, client) = session_pair(
            monitor,
            Duration::ZERO,
            settings(250, 2_000, true),
            64 * 1024,
        )
        .await?;
        let (summary, transcript) = tokio::join!(session.run(), drain(client));
        let summary = summary?;
        let transcript = transcript?;

        if summary.num_bytes != 0 || summary.measurements != 0 {
            return Err(AppError::session(format!("{:?}", summary)));
        }
        if transcript.binary_bytes != 0 || !transcript.measurements.is_empty() {
            return Err(AppError::session("Client received data for a zero duration"));
        }
        expect_normal_close(&transcript)?;
        Ok(())
    })
}

#[test]
fn dropped_client_aborts_with_transport_error() -> AppResult<()> {
    run_async_test(async {
        let monitor = BandwidthMonitor::new(DisabledProbe, None, true);
        let (session, client) = session_pair(
            monitor,
            Duration::from_secs(5),
            settings(250, 2_000, true),
            64 * 1024,
        )
        .await?;
        drop(client);
        match session.run().await {
            Err(SessionError::Transport {
                stage: SessionStage::Data,
                ..
            }) => Ok(()),
            other => Err(AppError::session(format!("got {:?}", other))),
        }
    })
}

#[test]
fn stalled_client_hits_write_timeout() -> AppResult<()> {
    run_async_test(async {
        let monitor = BandwidthMonitor::new(DisabledProbe, None, true);
        let (session, _client) = session_pair(
            monitor,
            Duration::from_secs(5),
            settings(10_000, 100, true),
            1024,
        )
        .await?;
        match session.run().await {
            Err(SessionError::WriteTimeout {
                stage: SessionStage::Data,
                timeout,
            }) if timeout == Duration::from_millis(100) => Ok(()),
            other => Err(AppError::session(format!("got {:?}", other))),
        }
    })
}

fn after(start: Instant, millis: u64) -> Instant {
    start
        .checked_add(Duration::from_millis(millis))
        .unwrap_or(start)
}

#[test]
fn tick_schedule_waits_one_interval() -> AppResult<()> {
    let start = Instant::now();
    let interval = Duration::from_millis(250);
    let schedule = TickSchedule::new(start, interval);
    if schedule.is_due(start) || schedule.is_due(after(start, 249)) {
        return Err(AppError::session("Tick fired before the interval"));
    }
    if !schedule.is_due(after(start, 250)) {
        return Err(AppError::session("Tick did not fire at the interval"));
    }
    Ok(())
}

#[test]
fn tick_schedule_coalesces_missed_ticks() -> AppResult<()> {
    let start = Instant::now();
    let interval = Duration::from_millis(100);
    let mut schedule = TickSchedule::new(start, interval);
    let late = after(start, 350);
    if !schedule.is_due(late) {
        return Err(AppError::session("Late tick should be due"));
    }
    schedule.advance(late);
    if schedule.is_due(late) || schedule.is_due(after(start, 400)) {
        return Err(AppError::session("Missed ticks were not coalesced"));
    }
    if !schedule.is_due(after(start, 450)) {
        return Err(AppError::session("Next tick should follow the served one"));
    }
    Ok(())
}

#[test]
fn summary_reports_throughput() -> AppResult<()> {
    let summary = SessionSummary {
        elapsed: Duration::from_secs(2),
        num_bytes: 25_000_000,
        measurements: 8,
        stop_reason: StopReason::DurationElapsed,
    };
    if summary.centi_mbps() != 10_000 || summary.throughput_label() != "100.00 Mbit/s" {
        return Err(AppError::session(summary.throughput_label()));
    }
    let idle = SessionSummary {
        elapsed: Duration::ZERO,
        num_bytes: 0,
        measurements: 0,
        stop_reason: StopReason::DurationElapsed,
    };
    if idle.centi_mbps() != 0 {
        return Err(AppError::session("Zero elapsed should report zero throughput"));
    }
    Ok(())
}
