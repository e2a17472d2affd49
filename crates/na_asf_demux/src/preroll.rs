//! Preroll clock state shared by the packet and payload decoders.

/// Microseconds per millisecond; the presentation clock runs in microseconds.
pub const US_PER_MS: i64 = 1000;

/// A preroll above this many microseconds switches timestamps to "huge delay" mode.
pub const HUGE_DELAY_US: i64 = 3_000_000;

/// Where preroll counting starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrerollStart {
    /// Resolved to the send time of the first decoded payload.
    #[default]
    FromCurrent,
    At(i64),
}

/// Per-session preroll bookkeeping (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrerollState {
    pub duration_ms: i64,
    pub start: PrerollStart,
}

impl PrerollState {
    pub fn new(duration_ms: i64, start: PrerollStart) -> Self {
        Self {
            duration_ms: duration_ms.max(0),
            start,
        }
    }

    /// Pin an unset start to `send_time_ms`. Returns the resolved start.
    pub fn resolve_start(&mut self, send_time_ms: u32) -> i64 {
        match self.start {
            PrerollStart::At(ms) => ms,
            PrerollStart::FromCurrent => {
                let ms = send_time_ms as i64;
                self.start = PrerollStart::At(ms);
                ms
            }
        }
    }

    /// Whether a packet sent at `send_time_ms` lies past the preroll window.
    pub fn is_done(&self, send_time_ms: u32) -> bool {
        match self.start {
            PrerollStart::At(start) => send_time_ms as i64 > start.saturating_add(self.duration_ms),
            PrerollStart::FromCurrent => false,
        }
    }

    pub fn is_huge_delay(&self) -> bool {
        self.duration_ms.saturating_mul(US_PER_MS) > HUGE_DELAY_US
    }

    /// `time_ms - preroll`, not clamped.
    #[inline]
    pub fn relative_ms(&self, time_ms: i64) -> i64 {
        time_ms - self.duration_ms
    }
}
