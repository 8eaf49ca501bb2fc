//! Chess clocks counted from elapsed wall time.
//!
//! Nothing here keeps a timer of its own. Every call takes `now`, and the
//! remaining time is the stored remainder minus `now - running_since`, so an
//! irregular polling interval never skews the count.

use chess_core::Color;
use std::time::{Duration, Instant};

/// One player's countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChessClock {
    remaining: Duration,
    running_since: Option<Instant>,
}

impl ChessClock {
    pub fn new(initial: Duration) -> Self {
        ChessClock {
            remaining: initial,
            running_since: None,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self
                .remaining
                .saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn stop(&mut self, now: Instant) {
        self.update(now);
        self.running_since = None;
    }

    /// Folds the time elapsed since the last update into the remainder.
    pub fn update(&mut self, now: Instant) {
        if let Some(since) = self.running_since {
            self.remaining = self.remaining(now);
            self.running_since = Some(now.max(since));
        }
    }

    pub fn add(&mut self, extra: Duration) {
        self.remaining += extra;
    }

    pub fn is_flagged(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }
}

/// `MM:SS`, or `SS.s` in the last minute.
pub fn format_clock(remaining: Duration) -> String {
    if remaining < Duration::from_secs(60) {
        let tenths = remaining.as_millis() / 100;
        format!("{:02}.{}", tenths / 10, tenths % 10)
    } else {
        let secs = remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Both players' clocks. At most one runs at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameClocks {
    white: ChessClock,
    black: ChessClock,
    increment: Duration,
    running: Option<Color>,
}

impl GameClocks {
    pub fn new(initial: Duration, increment: Duration) -> Self {
        GameClocks {
            white: ChessClock::new(initial),
            black: ChessClock::new(initial),
            increment,
            running: None,
        }
    }

    pub fn clock(&self, color: Color) -> &ChessClock {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn clock_mut(&mut self, color: Color) -> &mut ChessClock {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn running(&self) -> Option<Color> {
        self.running
    }

    pub fn remaining(&self, color: Color, now: Instant) -> Duration {
        self.clock(color).remaining(now)
    }

    /// Starts `color`'s clock, stopping the other one.
    pub fn start(&mut self, color: Color, now: Instant) {
        self.clock_mut(color.opposite()).stop(now);
        self.clock_mut(color).start(now);
        self.running = Some(color);
    }

    /// `mover` finished a move: their clock stops and gains the increment,
    /// the opponent's starts.
    pub fn switch_after_move(&mut self, mover: Color, now: Instant) {
        let increment = self.increment;
        let clock = self.clock_mut(mover);
        clock.stop(now);
        clock.add(increment);
        self.start(mover.opposite(), now);
    }

    /// Restarts `color`'s clock if no clock is running. A confirm press with
    /// no move pending lands here.
    pub fn rearm(&mut self, color: Color, now: Instant) {
        if self.running.is_none() {
            self.start(color, now);
        }
    }

    pub fn update(&mut self, now: Instant) {
        self.white.update(now);
        self.black.update(now);
    }

    /// The side whose time ran out, if any.
    pub fn flagged(&self, now: Instant) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|&color| self.clock(color).is_flagged(now))
    }

    pub fn stop_all(&mut self, now: Instant) {
        self.white.stop(now);
        self.black.stop(now);
        self.running = None;
    }

    /// Display text for both clocks, white first.
    pub fn display(&self, now: Instant) -> (String, String) {
        (
            format_clock(self.white.remaining(now)),
            format_clock(self.black.remaining(now)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn counts_elapsed_time_not_calls() {
        let t0 = Instant::now();
        let mut clock = ChessClock::new(Duration::from_secs(10));
        clock.start(t0);
        assert!(clock.is_running());

        // Irregular polling: three updates, one long gap.
        clock.update(t0 + Duration::from_millis(100));
        clock.update(t0 + Duration::from_millis(150));
        clock.update(t0 + Duration::from_millis(3_000));
        assert_eq!(clock.remaining(t0 + Duration::from_millis(3_000)), Duration::from_secs(7));
        assert_eq!(clock.remaining(t0 + 4 * SECOND), Duration::from_secs(6));
    }

    #[test]
    fn stopped_clock_does_not_move() {
        let t0 = Instant::now();
        let mut clock = ChessClock::new(Duration::from_secs(10));
        clock.start(t0);
        clock.stop(t0 + 2 * SECOND);
        assert!(!clock.is_running());
        assert_eq!(clock.remaining(t0 + 60 * SECOND), Duration::from_secs(8));
    }

    #[test]
    fn flag_saturates_at_zero() {
        let t0 = Instant::now();
        let mut clock = ChessClock::new(SECOND);
        clock.start(t0);
        assert!(!clock.is_flagged(t0));
        assert!(clock.is_flagged(t0 + 5 * SECOND));
        assert_eq!(clock.remaining(t0 + 5 * SECOND), Duration::ZERO);
    }

    #[test]
    fn format() {
        assert_eq!(format_clock(Duration::from_secs(900)), "15:00");
        assert_eq!(format_clock(Duration::from_secs(61)), "01:01");
        assert_eq!(format_clock(Duration::from_millis(59_940)), "59.9");
        assert_eq!(format_clock(Duration::from_millis(4_250)), "04.2");
        assert_eq!(format_clock(Duration::ZERO), "00.0");
    }

    #[test]
    fn switch_adds_increment_to_the_mover() {
        let t0 = Instant::now();
        let mut clocks = GameClocks::new(Duration::from_secs(60), Duration::from_secs(2));
        clocks.start(Color::White, t0);
        clocks.switch_after_move(Color::White, t0 + 5 * SECOND);

        assert_eq!(clocks.running(), Some(Color::Black));
        assert_eq!(clocks.remaining(Color::White, t0 + 30 * SECOND), Duration::from_secs(57));
        assert_eq!(clocks.remaining(Color::Black, t0 + 30 * SECOND), Duration::from_secs(35));
        assert!(!clocks.clock(Color::White).is_running());
    }

    #[test]
    fn rearm_only_starts_an_idle_pair() {
        let t0 = Instant::now();
        let mut clocks = GameClocks::new(Duration::from_secs(60), Duration::ZERO);
        clocks.rearm(Color::Black, t0);
        assert_eq!(clocks.running(), Some(Color::Black));
        clocks.rearm(Color::White, t0 + SECOND);
        assert_eq!(clocks.running(), Some(Color::Black));

        clocks.stop_all(t0 + 2 * SECOND);
        assert_eq!(clocks.running(), None);
        assert_eq!(clocks.flagged(t0 + 100 * SECOND), None);
    }

    #[test]
    fn flagged_side_is_reported() {
        let t0 = Instant::now();
        let mut clocks = GameClocks::new(Duration::from_secs(3), Duration::ZERO);
        clocks.start(Color::Black, t0);
        clocks.update(t0 + 4 * SECOND);
        assert_eq!(clocks.flagged(t0 + 4 * SECOND), Some(Color::Black));
        assert_eq!(
            clocks.display(t0 + 4 * SECOND),
            ("03.0".to_string(), "00.0".to_string())
        );
    }
}
