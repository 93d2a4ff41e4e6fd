//! Tap tempo estimation
//!
//! Keeps a short history of tap timestamps in a fixed array so taps can be
//! registered from the audio thread without allocating.

use std::time::Duration;

/// Slowest tempo a tap sequence may imply
pub const TAP_MIN_BPM: f64 = 60.0;
/// Fastest tempo a tap sequence may imply
pub const TAP_MAX_BPM: f64 = 200.0;

const TAP_HISTORY: usize = 8;

/// What happened to a registered tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapResult {
    /// First tap of a new sequence, nothing to estimate yet
    Started,
    /// Tempo recomputed from the taps in the window
    Tempo(f64),
    /// Interval implied a tempo above the accepted range; tap ignored
    Rejected,
}

#[derive(Debug, Clone)]
pub struct TapTempo {
    window: Duration,
    taps: [Duration; TAP_HISTORY],
    len: usize,
}

impl TapTempo {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            taps: [Duration::ZERO; TAP_HISTORY],
            len: 0,
        }
    }

    /// Register a tap at `timestamp` (any monotonic origin)
    ///
    /// Taps older than the window are forgotten. An interval that is too
    /// short (double-trigger) is ignored outright. An interval that is too
    /// long means the user started over, so the tap opens a new sequence.
    pub fn tap(&mut self, timestamp: Duration) -> TapResult {
        let Some(last) = self.last() else {
            self.restart(timestamp);
            return TapResult::Started;
        };

        if timestamp <= last {
            // Clock went backwards (new controller, wrapped timestamp)
            self.restart(timestamp);
            return TapResult::Started;
        }

        let interval = (timestamp - last).as_secs_f64();
        let implied = 60.0 / interval;
        if implied > TAP_MAX_BPM {
            return TapResult::Rejected;
        }
        if implied < TAP_MIN_BPM {
            self.restart(timestamp);
            return TapResult::Started;
        }

        self.drop_expired(timestamp);
        self.push(timestamp);

        match self.average_interval() {
            Some(avg) => TapResult::Tempo(60.0 / avg),
            None => TapResult::Started,
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Number of taps currently in the window
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn last(&self) -> Option<Duration> {
        self.len.checked_sub(1).map(|i| self.taps[i])
    }

    fn restart(&mut self, timestamp: Duration) {
        self.taps[0] = timestamp;
        self.len = 1;
    }

    fn drop_expired(&mut self, now: Duration) {
        let keep_from = self.taps[..self.len]
            .iter()
            .position(|&t| now.saturating_sub(t) <= self.window)
            .unwrap_or(self.len);
        if keep_from > 0 {
            self.taps.copy_within(keep_from..self.len, 0);
            self.len -= keep_from;
        }
    }

    fn push(&mut self, timestamp: Duration) {
        if self.len == TAP_HISTORY {
            self.taps.copy_within(1.., 0);
            self.len -= 1;
        }
        self.taps[self.len] = timestamp;
        self.len += 1;
    }

    /// Mean inter-tap interval in seconds
    fn average_interval(&self) -> Option<f64> {
        if self.len < 2 {
            return None;
        }
        let span = (self.taps[self.len - 1] - self.taps[0]).as_secs_f64();
        Some(span / (self.len - 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_steady_taps_give_120() {
        let mut tap = TapTempo::new(ms(2000));
        assert_eq!(tap.tap(ms(0)), TapResult::Started);
        for t in [500, 1000, 1500] {
            match tap.tap(ms(t)) {
                TapResult::Tempo(bpm) => assert!((bpm - 120.0).abs() < 0.01),
                other => panic!("expected tempo, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_fast_double_tap_rejected() {
        let mut tap = TapTempo::new(ms(2000));
        tap.tap(ms(0));
        assert_eq!(tap.tap(ms(100)), TapResult::Rejected);
        assert_eq!(tap.len(), 1);
        // The rejected tap does not disturb the estimate
        assert_eq!(tap.tap(ms(500)), TapResult::Tempo(120.0));
    }

    #[test]
    fn test_long_pause_restarts_sequence() {
        let mut tap = TapTempo::new(ms(2000));
        tap.tap(ms(0));
        tap.tap(ms(500));
        assert_eq!(tap.tap(ms(5000)), TapResult::Started);
        assert_eq!(tap.len(), 1);
    }

    #[test]
    fn test_window_forgets_old_taps() {
        let mut tap = TapTempo::new(ms(2000));
        // 100 BPM taps, 600ms apart
        for t in [0, 600, 1200, 1800, 2400, 3000] {
            tap.tap(ms(t));
        }
        // Only taps within 2s of the latest remain: 1200, 1800, 2400, 3000
        assert_eq!(tap.len(), 4);
    }

    #[test]
    fn test_backwards_timestamp_restarts() {
        let mut tap = TapTempo::new(ms(2000));
        tap.tap(ms(1000));
        assert_eq!(tap.tap(ms(400)), TapResult::Started);
    }
}
