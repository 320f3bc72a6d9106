use std::convert::Infallible;

use tokio::net::TcpStream;

use super::{BandwidthSample, CongestionProbe};

/// Probe that never attaches; sessions run for their full duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProbe;

impl CongestionProbe for DisabledProbe {
    type Handle = Infallible;

    fn attach(&self, _socket: &TcpStream) -> Option<Self::Handle> {
        None
    }

    fn sample(&self, handle: &Self::Handle) -> Option<BandwidthSample> {
        match *handle {}
    }
}
