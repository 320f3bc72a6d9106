use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::HandshakeError;
use crate::ndt7::bandwidth::BandwidthMonitor;
use crate::ndt7::download::{DownloadSession, SessionSettings};
use crate::ndt7::handshake;
use crate::ndt7::payload::PreparedPayload;
use crate::probe::CongestionProbe;

#[derive(Debug, Clone, Copy)]
pub(super) struct ConnectionSettings {
    pub(super) max_message_size: usize,
    pub(super) session: SessionSettings,
}

/// Serves one accepted connection from handshake to close. Every outcome is
/// logged here; nothing is reported back to the accept loop.
pub(super) async fn serve_connection<P>(
    stream: TcpStream,
    peer: SocketAddr,
    probe: P,
    settings: ConnectionSettings,
) where
    P: CongestionProbe,
{
    if let Err(err) = stream.set_nodelay(true) {
        debug!("Cannot set TCP_NODELAY for {}: {}", peer, err);
    }

    let (websocket, request) = match handshake::upgrade(stream, settings.max_message_size).await {
        Ok(upgraded) => upgraded,
        Err(HandshakeError::Rejected { source }) => {
            info!("Rejected request from {}: {}", peer, source);
            return;
        }
        Err(HandshakeError::Incomplete) => {
            debug!("Connection from {} closed before sending a request", peer);
            return;
        }
        Err(err) => {
            warn!("Websocket upgrade from {} failed: {}", peer, err);
            return;
        }
    };

    let handle = probe.attach(websocket.get_ref().get_ref());
    if handle.is_none() {
        debug!("No congestion-control data for {}, early stop disabled", peer);
    }
    let monitor = BandwidthMonitor::new(probe, handle, settings.session.early_stop);

    let payload = match PreparedPayload::generate() {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Download to {} not started: {}", peer, err);
            return;
        }
    };

    info!(
        "Download to {} started (duration {}s)",
        peer,
        request.duration.as_secs()
    );
    let session = DownloadSession::new(
        websocket,
        monitor,
        payload,
        request.duration,
        settings.session,
    );
    match session.run().await {
        Ok(summary) => info!(
            "Download to {} finished: {} bytes in {:?} ({}), {} measurements, {}",
            peer,
            summary.num_bytes,
            summary.elapsed,
            summary.throughput_label(),
            summary.measurements,
            summary.stop_reason.as_str()
        ),
        Err(err) => match err.stage() {
            Some(stage) => warn!("Download to {} aborted on {}: {}", peer, stage, err),
            None => warn!("Download to {} aborted: {}", peer, err),
        },
    }
}
