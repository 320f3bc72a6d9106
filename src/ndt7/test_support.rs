use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::net::TcpStream;

use crate::probe::{BandwidthSample, CongestionProbe};

/// Probe replaying a fixed list of samples, one per call to `sample`.
/// `None` entries simulate ticks where the kernel had nothing to report.
pub(crate) struct ScriptedProbe {
    samples: Vec<Option<BandwidthSample>>,
    cursor: AtomicUsize,
}

impl ScriptedProbe {
    pub(crate) fn new(samples: Vec<Option<BandwidthSample>>) -> Self {
        Self {
            samples,
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn bandwidths(values: &[u64]) -> Self {
        Self::new(
            values
                .iter()
                .map(|bandwidth| {
                    Some(BandwidthSample {
                        bandwidth: *bandwidth,
                        rtt_micros: 1_000,
                    })
                })
                .collect(),
        )
    }
}

impl CongestionProbe for ScriptedProbe {
    type Handle = ();

    fn attach(&self, _socket: &TcpStream) -> Option<Self::Handle> {
        Some(())
    }

    fn sample(&self, _handle: &Self::Handle) -> Option<BandwidthSample> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.samples.get(index).copied().flatten()
    }
}
