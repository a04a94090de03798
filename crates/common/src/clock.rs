//! Clock and timing utilities for timeline playback.
//!
//! All Ad Studio playback is driven by a single virtual play position that
//! advances from wall-clock (or fixed) deltas. This module provides:
//! - The timeline clock (start/stop/tick/seek/reset)
//! - A rate controller for throttling periodic work

/// Signals emitted by [`TimelineClock::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The play position reached the end of the timeline. The clock has
    /// stopped itself and reset to zero.
    Ended,
}

/// Virtual play position spanning the whole timeline.
///
/// Playback is a single playthrough: reaching the total duration stops the
/// clock and rewinds it to zero instead of looping.
#[derive(Debug, Clone, Default)]
pub struct TimelineClock {
    current_secs: f64,
    total_secs: f64,
    playing: bool,
}

impl TimelineClock {
    /// Create a stopped clock for a timeline of the given length.
    pub fn new(total_secs: f64) -> Self {
        Self {
            current_secs: 0.0,
            total_secs: sanitize_total(total_secs),
            playing: false,
        }
    }

    /// Start advancing. Returns `false` (and stays stopped) when the
    /// timeline is empty.
    pub fn start(&mut self) -> bool {
        if self.total_secs <= 0.0 {
            self.playing = false;
            return false;
        }
        self.playing = true;
        true
    }

    /// Stop advancing; the play position is kept.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Rewind to zero without changing the play state.
    pub fn reset(&mut self) {
        self.current_secs = 0.0;
    }

    /// Move the play position, clamped into `[0, total)`.
    pub fn seek(&mut self, secs: f64) {
        if !secs.is_finite() || secs <= 0.0 || self.total_secs <= 0.0 {
            self.current_secs = 0.0;
        } else if secs >= self.total_secs {
            // Seeking onto the end behaves like reaching it.
            self.current_secs = 0.0;
            self.playing = false;
        } else {
            self.current_secs = secs;
        }
    }

    /// Replace the timeline length (the scene list changed).
    pub fn set_total(&mut self, total_secs: f64) {
        self.total_secs = sanitize_total(total_secs);
        if self.current_secs >= self.total_secs {
            self.current_secs = 0.0;
        }
        if self.total_secs <= 0.0 {
            self.playing = false;
        }
    }

    /// Advance by `delta_secs` while playing.
    ///
    /// Zero, negative and non-finite deltas are no-ops.
    pub fn tick(&mut self, delta_secs: f64) -> Option<ClockEvent> {
        if !self.playing || !delta_secs.is_finite() || delta_secs <= 0.0 {
            return None;
        }

        let next = self.current_secs + delta_secs;
        if next >= self.total_secs {
            self.playing = false;
            self.current_secs = 0.0;
            return Some(ClockEvent::Ended);
        }

        self.current_secs = next;
        None
    }

    /// Current play position in seconds.
    pub fn current_secs(&self) -> f64 {
        self.current_secs
    }

    /// Timeline length in seconds.
    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    /// Whether the clock is advancing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

fn sanitize_total(total_secs: f64) -> f64 {
    if total_secs.is_finite() && total_secs > 0.0 {
        total_secs
    } else {
        0.0
    }
}

/// Frame rate controller for throttling periodic work.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_only_while_playing() {
        let mut clock = TimelineClock::new(10.0);
        assert_eq!(clock.tick(1.0), None);
        assert_eq!(clock.current_secs(), 0.0);

        assert!(clock.start());
        assert_eq!(clock.tick(1.5), None);
        assert!((clock.current_secs() - 1.5).abs() < 1e-12);

        clock.stop();
        clock.tick(2.0);
        assert!((clock.current_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let mut clock = TimelineClock::new(10.0);
        clock.start();
        clock.tick(3.0);
        assert_eq!(clock.tick(0.0), None);
        assert_eq!(clock.tick(-1.0), None);
        assert_eq!(clock.tick(f64::NAN), None);
        assert!((clock.current_secs() - 3.0).abs() < 1e-12);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_end_stops_and_rewinds() {
        let mut clock = TimelineClock::new(10.0);
        clock.start();
        assert_eq!(clock.tick(4.0), None);
        assert_eq!(clock.tick(6.0), Some(ClockEvent::Ended));
        assert_eq!(clock.current_secs(), 0.0);
        assert!(!clock.is_playing());

        // No auto-repeat: further ticks do nothing until restarted.
        assert_eq!(clock.tick(1.0), None);
        assert_eq!(clock.current_secs(), 0.0);
    }

    #[test]
    fn test_empty_timeline_refuses_start() {
        let mut clock = TimelineClock::new(0.0);
        assert!(!clock.start());
        assert!(!clock.is_playing());
        assert_eq!(clock.tick(1.0), None);
    }

    #[test]
    fn test_seek_and_set_total_clamp() {
        let mut clock = TimelineClock::new(10.0);
        clock.seek(7.5);
        assert!((clock.current_secs() - 7.5).abs() < 1e-12);
        clock.seek(-3.0);
        assert_eq!(clock.current_secs(), 0.0);

        clock.seek(8.0);
        clock.set_total(5.0);
        assert_eq!(clock.current_secs(), 0.0);
        assert_eq!(clock.total_secs(), 5.0);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(30);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(10_000_000)); // 10ms later, too soon
        assert!(ctrl.should_tick(34_000_000)); // ~34ms later, should fire (30Hz ~ 33.3ms)
    }
}
