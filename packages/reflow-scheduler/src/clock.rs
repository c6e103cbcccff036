use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Which time source flush timestamps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Monotonic, measured from the clock's construction.
    HighRes,
    /// Wall clock, milliseconds since the unix epoch.
    LowRes,
}

/// Time source for flush timestamps, resolved once at construction.
///
/// Hosts stamp input events with one of two clocks: a monotonic
/// high-resolution clock with a recent origin, or the wall clock. Timeout
/// bookkeeping that compares a saved flush timestamp against event
/// timestamps only works if both come from the same source, so the probe
/// picks whichever source the host's event timestamps are on.
pub struct FlushClock {
    source: ClockSource,
    origin: Instant,
}

fn wall_now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

impl FlushClock {
    /// Probe against an event timestamp observed from the host, if any.
    ///
    /// An event stamped by a high-resolution clock reads far below the wall
    /// clock (its origin is process start, not the epoch). So: wall reading
    /// greater than the observed stamp means events are high-res and we
    /// follow them. With nothing to compare against, stay on the wall clock.
    pub fn probe(observed_event_timestamp: Option<f64>) -> Self {
        let source = match observed_event_timestamp {
            Some(ts) if wall_now_ms() > ts => ClockSource::HighRes,
            Some(_) => ClockSource::LowRes,
            None => ClockSource::LowRes,
        };
        Self {
            source,
            origin: Instant::now(),
        }
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    /// Current time in milliseconds on the resolved source.
    pub fn now(&self) -> f64 {
        match self.source {
            ClockSource::HighRes => self.origin.elapsed().as_secs_f64() * 1000.0,
            ClockSource::LowRes => wall_now_ms(),
        }
    }
}

impl Default for FlushClock {
    fn default() -> Self {
        Self::probe(None)
    }
}
