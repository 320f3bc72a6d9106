use crate::probe::{BandwidthSample, CongestionProbe};

/// Reports whether the download may stop given the previous and current
/// bandwidth samples (bytes per second).
///
/// The download may stop once the bandwidth is no longer decreasing and
/// grew by less than 25% of the previous sample, the growth threshold BBR
/// uses to decide it has filled the pipe. Evaluated as
/// `4 * (cur - prev) < prev` to stay in integer arithmetic.
#[must_use]
pub const fn stoppable(prev: u64, cur: u64) -> bool {
    cur >= prev && cur.saturating_sub(prev).saturating_mul(4) < prev
}

/// Result of one scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// Fresh sample, if the probe produced one this tick.
    pub sample: Option<BandwidthSample>,
    /// Whether the bandwidth has stopped growing.
    pub stop: bool,
}

/// Tracks successive bandwidth samples of a session and applies
/// [`stoppable`] to them.
pub struct BandwidthMonitor<P>
where
    P: CongestionProbe,
{
    probe: P,
    handle: Option<P::Handle>,
    previous: Option<u64>,
    early_stop: bool,
}

impl<P> BandwidthMonitor<P>
where
    P: CongestionProbe,
{
    /// `handle` is `None` when the socket could not be observed; the monitor
    /// then never produces samples. With `early_stop` off, samples are still
    /// taken but never stop the session.
    pub const fn new(probe: P, handle: Option<P::Handle>, early_stop: bool) -> Self {
        Self {
            probe,
            handle,
            previous: None,
            early_stop,
        }
    }

    #[must_use]
    pub const fn is_observing(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub const fn previous_bandwidth(&self) -> Option<u64> {
        self.previous
    }

    /// Samples the probe once and evaluates the stop rule against the last
    /// fresh sample. A missing sample keeps the previous bandwidth and never
    /// stops.
    pub fn observe(&mut self) -> Observation {
        let Some(handle) = self.handle.as_ref() else {
            return Observation::default();
        };
        let Some(sample) = self.probe.sample(handle) else {
            return Observation::default();
        };
        let stop = self.record(sample.bandwidth);
        Observation {
            sample: Some(sample),
            stop,
        }
    }

    fn record(&mut self, bandwidth: u64) -> bool {
        let stop = self.early_stop
            && self
                .previous
                .is_some_and(|previous| stoppable(previous, bandwidth));
        self.previous = Some(bandwidth);
        stop
    }
}
