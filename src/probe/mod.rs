//! Congestion-control observation.
//!
//! A probe attaches to an accepted socket and, where the kernel exposes it,
//! samples the bandwidth and round-trip-time estimate kept by the socket's
//! congestion-control algorithm. Both operations report absence with `None`;
//! a socket without a handle simply runs without early stopping.
#[cfg(target_os = "linux")]
mod bbr;
mod disabled;

use tokio::net::TcpStream;

#[cfg(target_os = "linux")]
pub use bbr::{BbrHandle, BbrProbe};
pub use disabled::DisabledProbe;

/// One reading of the transport's congestion-control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandwidthSample {
    /// Bandwidth estimate in bytes per second.
    pub bandwidth: u64,
    /// Round-trip-time estimate in microseconds.
    pub rtt_micros: u64,
}

pub trait CongestionProbe {
    /// Observation handle owned by a session; dropping it releases it.
    type Handle;

    /// Obtains an observation handle for an accepted socket.
    fn attach(&self, socket: &TcpStream) -> Option<Self::Handle>;

    /// Reads a fresh sample, or `None` when none is available right now.
    fn sample(&self, handle: &Self::Handle) -> Option<BandwidthSample>;
}

#[cfg(target_os = "linux")]
pub type PlatformProbe = BbrProbe;
#[cfg(not(target_os = "linux"))]
pub type PlatformProbe = DisabledProbe;

/// Builds the probe for the current platform.
///
/// `switch_to_bbr` asks the kernel to move accepted sockets to BBR before
/// sampling; it has no effect where BBR is unavailable.
#[cfg(target_os = "linux")]
#[must_use]
pub const fn platform_probe(switch_to_bbr: bool) -> PlatformProbe {
    BbrProbe::new(switch_to_bbr)
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub const fn platform_probe(_switch_to_bbr: bool) -> PlatformProbe {
    DisabledProbe
}
